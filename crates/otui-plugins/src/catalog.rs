//! `plugins.db`: the tabular installed-plugin catalog, backed by SQLite.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{
    error::Result,
    types::{AuthType, InstallType, InstalledPlugin, PluginTransport},
};

/// Run pending migrations against a freshly opened pool.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").set_ignore_missing(true).run(pool).await?;
    Ok(())
}

pub struct InstalledPluginCatalog {
    pool: SqlitePool,
}

impl InstalledPluginCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn upsert(&self, plugin: &InstalledPlugin) -> Result<()> {
        sqlx::query(
            "INSERT INTO installed_plugins
                (id, version, install_path, install_method, server_url, auth_type, transport, installed_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                version=excluded.version, install_path=excluded.install_path,
                install_method=excluded.install_method, server_url=excluded.server_url,
                auth_type=excluded.auth_type, transport=excluded.transport, updated_at=excluded.updated_at",
        )
        .bind(&plugin.id)
        .bind(&plugin.version)
        .bind(&plugin.install_path)
        .bind(install_type_to_str(plugin.install_method))
        .bind(&plugin.server_url)
        .bind(plugin.auth_type.map(auth_type_to_str))
        .bind(plugin.transport.map(transport_to_str))
        .bind(plugin.installed_at.to_rfc3339())
        .bind(plugin.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<InstalledPlugin>> {
        let row: Option<Row> = sqlx::query_as(
            "SELECT id, version, install_path, install_method, server_url, auth_type, transport, installed_at, updated_at
             FROM installed_plugins WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM installed_plugins WHERE id = ?").bind(id).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<InstalledPlugin>> {
        let rows: Vec<Row> = sqlx::query_as(
            "SELECT id, version, install_path, install_method, server_url, auth_type, transport, installed_at, updated_at
             FROM installed_plugins",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

type Row = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    String,
);

impl TryFrom<Row> for InstalledPlugin {
    type Error = crate::error::Error;

    fn try_from(row: Row) -> Result<Self> {
        let (id, version, install_path, install_method, server_url, auth_type, transport, installed_at, updated_at) = row;
        Ok(InstalledPlugin {
            id,
            version,
            install_path,
            install_method: install_type_from_str(&install_method)?,
            server_url,
            auth_type: auth_type.as_deref().map(auth_type_from_str).transpose()?,
            transport: transport.as_deref().map(transport_from_str).transpose()?,
            installed_at: parse_timestamp(&installed_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(|e| crate::error::Error::Message(format!("bad timestamp '{s}': {e}")))?
        .with_timezone(&Utc))
}

fn install_type_to_str(t: InstallType) -> &'static str {
    match t {
        InstallType::Npm => "npm",
        InstallType::Pip => "pip",
        InstallType::Go => "go",
        InstallType::Binary => "binary",
        InstallType::Manual => "manual",
        InstallType::Remote => "remote",
        InstallType::Docker => "docker",
    }
}

fn install_type_from_str(s: &str) -> Result<InstallType> {
    Ok(match s {
        "npm" => InstallType::Npm,
        "pip" => InstallType::Pip,
        "go" => InstallType::Go,
        "binary" => InstallType::Binary,
        "manual" => InstallType::Manual,
        "remote" => InstallType::Remote,
        "docker" => InstallType::Docker,
        other => return Err(crate::error::Error::Message(format!("unknown install_method '{other}'"))),
    })
}

fn auth_type_to_str(t: AuthType) -> &'static str {
    match t {
        AuthType::None => "none",
        AuthType::Headers => "headers",
        AuthType::OAuth => "oauth",
    }
}

fn auth_type_from_str(s: &str) -> Result<AuthType> {
    Ok(match s {
        "none" => AuthType::None,
        "headers" => AuthType::Headers,
        "oauth" => AuthType::OAuth,
        other => return Err(crate::error::Error::Message(format!("unknown auth_type '{other}'"))),
    })
}

fn transport_to_str(t: PluginTransport) -> &'static str {
    match t {
        PluginTransport::Sse => "sse",
        PluginTransport::StreamableHttp => "streamable-http",
    }
}

fn transport_from_str(s: &str) -> Result<PluginTransport> {
    Ok(match s {
        "sse" => PluginTransport::Sse,
        "streamable-http" => PluginTransport::StreamableHttp,
        other => return Err(crate::error::Error::Message(format!("unknown transport '{other}'"))),
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use chrono::Utc;
    use sqlx::SqlitePool;

    use super::*;

    async fn test_catalog() -> InstalledPluginCatalog {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        InstalledPluginCatalog::new(pool)
    }

    fn sample(id: &str) -> InstalledPlugin {
        let now = Utc::now();
        InstalledPlugin {
            id: id.to_string(),
            version: "1.0.0".to_string(),
            install_path: format!("/opt/plugins/{id}"),
            install_method: InstallType::Npm,
            server_url: None,
            auth_type: None,
            transport: None,
            installed_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let catalog = test_catalog().await;
        catalog.upsert(&sample("fs")).await.unwrap();
        let fetched = catalog.get("fs").await.unwrap().unwrap();
        assert_eq!(fetched.version, "1.0.0");
    }

    #[tokio::test]
    async fn upsert_updates_existing_row() {
        let catalog = test_catalog().await;
        catalog.upsert(&sample("fs")).await.unwrap();
        let mut updated = sample("fs");
        updated.version = "2.0.0".to_string();
        catalog.upsert(&updated).await.unwrap();

        let fetched = catalog.get("fs").await.unwrap().unwrap();
        assert_eq!(fetched.version, "2.0.0");
        assert_eq!(catalog.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remove_deletes_row() {
        let catalog = test_catalog().await;
        catalog.upsert(&sample("fs")).await.unwrap();
        catalog.remove("fs").await.unwrap();
        assert!(catalog.get("fs").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_plugin_is_none() {
        let catalog = test_catalog().await;
        assert!(catalog.get("nonexistent").await.unwrap().is_none());
    }
}
