//! Canopy command-line entry point.
//!
//! Every command connects, applies pending migrations and seeds the
//! permission catalog before doing its own work.

mod config;

use std::process::ExitCode;

use canopy_authz::catalog;
use canopy_authz::{AuthorizationService, TenantService, UserService};
use canopy_core::error::{CanopyError, CanopyResult};
use canopy_core::models::user::CreateUser;
use canopy_core::repository::{Stores, TenantRepository};
use canopy_db::DbManager;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::{ServerArgs, ServerConfig};

#[derive(Parser)]
#[command(name = "canopy", version, about = "Multi-tenant hierarchical RBAC")]
struct Cli {
    #[command(flatten)]
    server: ServerArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply migrations and seed the permission catalog
    Migrate,

    /// Create a tenant and its first administrator, unless the code is taken
    Bootstrap {
        #[arg(long, env = "CANOPY_BOOTSTRAP_TENANT_CODE")]
        tenant_code: String,
        #[arg(long, env = "CANOPY_BOOTSTRAP_TENANT_NAME")]
        tenant_name: String,
        #[arg(long, env = "CANOPY_BOOTSTRAP_ADMIN_USERNAME")]
        admin_username: String,
        #[arg(long, env = "CANOPY_BOOTSTRAP_ADMIN_EMAIL")]
        admin_email: String,
        /// Make the administrator a platform admin (may create tenants)
        #[arg(long, env = "CANOPY_BOOTSTRAP_PLATFORM")]
        platform: bool,
    },

    /// Ask whether a user holds a permission
    Check {
        #[arg(long)]
        username: String,
        #[arg(long)]
        permission: String,
        /// Resource to check; omit for a global check
        #[arg(long)]
        resource: Option<Uuid>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("canopy=info,canopy_authz=info,canopy_db=info")
        }))
        .json()
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::from(cli.server);

    match run(config, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_access_denied() => {
            info!(error = %e, "Check denied");
            ExitCode::from(2)
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ServerConfig, command: Command) -> CanopyResult<()> {
    let db = DbManager::connect(&config.db).await?;
    db.migrate().await?;

    let stores = db.stores();
    catalog::seed(&stores).await?;

    match command {
        Command::Migrate => {
            info!("Schema and catalog are up to date");
            Ok(())
        }
        Command::Bootstrap {
            tenant_code,
            tenant_name,
            admin_username,
            admin_email,
            platform,
        } => {
            if stores.tenants().exists_by_code(&tenant_code).await? {
                info!(code = %tenant_code, "Tenant already exists, nothing to do");
                return Ok(());
            }

            let users = UserService::new(stores.clone());
            let admin = match users.get_by_username(&admin_username).await {
                Ok(user) => user,
                Err(CanopyError::NotFound { .. }) => {
                    users
                        .create_user(CreateUser {
                            username: admin_username,
                            email: admin_email,
                        })
                        .await?
                }
                Err(e) => return Err(e),
            };

            let tenants = TenantService::new(stores, config.authz);
            let boot = if platform {
                tenants
                    .bootstrap_platform(&tenant_name, &tenant_code, admin.id)
                    .await?
            } else {
                tenants
                    .bootstrap(&tenant_name, &tenant_code, admin.id)
                    .await?
            };
            info!(
                tenant_id = %boot.tenant.id,
                root_id = %boot.root.id,
                admin = %admin.username,
                platform,
                "Tenant ready"
            );
            Ok(())
        }
        Command::Check {
            username,
            permission,
            resource,
        } => {
            let user = UserService::new(stores.clone())
                .get_by_username(&username)
                .await?;
            let authz = AuthorizationService::from_stores(&stores, config.authz);
            match resource {
                Some(resource_id) => {
                    authz
                        .check_permission(user.id, resource_id, &permission)
                        .await?
                }
                None => authz.check_global_permission(user.id, &permission).await?,
            }
            info!(user = %user.username, permission = %permission, "Granted");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn check_without_resource_is_global() {
        let cli = Cli::try_parse_from([
            "canopy",
            "check",
            "--username",
            "alice",
            "--permission",
            "READ",
        ])
        .unwrap();
        match cli.command {
            Command::Check { resource, .. } => assert!(resource.is_none()),
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn bootstrap_is_tenant_scoped_unless_asked() {
        let args = [
            "canopy",
            "bootstrap",
            "--tenant-code",
            "platform",
            "--tenant-name",
            "Platform",
            "--admin-username",
            "root",
            "--admin-email",
            "root@example.com",
        ];
        let plain = Cli::try_parse_from(args).unwrap();
        let lifted = Cli::try_parse_from(args.iter().copied().chain(["--platform"])).unwrap();
        match (plain.command, lifted.command) {
            (
                Command::Bootstrap { platform: false, .. },
                Command::Bootstrap { platform: true, .. },
            ) => {}
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = Cli::try_parse_from([
            "canopy",
            "--db-namespace",
            "acme",
            "--tenant-admin-role",
            "OWNER",
            "migrate",
        ])
        .unwrap();
        let config = ServerConfig::from(cli.server);
        assert_eq!(config.db.namespace, "acme");
        assert_eq!(config.authz.tenant_admin_role, "OWNER");
    }
}
