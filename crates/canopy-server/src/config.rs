//! Process configuration, from flags or `CANOPY_*` environment variables.

use canopy_authz::AuthzConfig;
use canopy_db::DbConfig;
use clap::Args;

/// Connection and policy settings shared by every command.
#[derive(Debug, Clone, Args)]
pub struct ServerArgs {
    /// SurrealDB WebSocket address
    #[arg(long, env = "CANOPY_DB_URL", default_value = "127.0.0.1:8000", global = true)]
    pub db_url: String,

    #[arg(long, env = "CANOPY_DB_NAMESPACE", default_value = "canopy", global = true)]
    pub db_namespace: String,

    #[arg(long, env = "CANOPY_DB_DATABASE", default_value = "main", global = true)]
    pub db_database: String,

    #[arg(long, env = "CANOPY_DB_USERNAME", default_value = "root", global = true)]
    pub db_username: String,

    #[arg(
        long,
        env = "CANOPY_DB_PASSWORD",
        default_value = "root",
        hide_env_values = true,
        global = true
    )]
    pub db_password: String,

    /// System role granted to a tenant's creator
    #[arg(
        long,
        env = "CANOPY_TENANT_ADMIN_ROLE",
        default_value = canopy_authz::catalog::roles::TENANT_ADMIN,
        global = true
    )]
    pub tenant_admin_role: String,

    /// Log every step of every decision at debug level
    #[arg(long, env = "CANOPY_TRACE_DECISIONS", global = true)]
    pub trace_decisions: bool,
}

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db: DbConfig,
    pub authz: AuthzConfig,
}

impl From<ServerArgs> for ServerConfig {
    fn from(args: ServerArgs) -> Self {
        Self {
            db: DbConfig {
                url: args.db_url,
                namespace: args.db_namespace,
                database: args.db_database,
                username: args.db_username,
                password: args.db_password,
            },
            authz: AuthzConfig {
                tenant_admin_role: args.tenant_admin_role,
                trace_decisions: args.trace_decisions,
            },
        }
    }
}
