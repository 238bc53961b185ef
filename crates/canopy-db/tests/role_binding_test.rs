//! Integration tests for the Permission, Role, User and Binding
//! repositories using in-memory SurrealDB.

use canopy_core::error::CanopyError;
use canopy_core::models::binding::BindingKey;
use canopy_core::models::permission::CreatePermission;
use canopy_core::models::resource::{CreateResource, ROOT_PATH, TENANT_ROOT_TYPE};
use canopy_core::models::role::RoleScope;
use canopy_core::models::user::CreateUser;
use canopy_core::repository::{
    BindingRepository, PermissionRepository, ResourceRepository, RoleRepository, Stores,
    UserRepository,
};
use canopy_db::SurrealStores;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> SurrealStores<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    canopy_db::run_migrations(&db).await.unwrap();
    SurrealStores::new(db)
}

async fn permission(stores: &SurrealStores<Db>, name: &str) -> Uuid {
    stores
        .permissions()
        .create(CreatePermission {
            name: name.into(),
            description: format!("{name} permission"),
        })
        .await
        .unwrap()
        .id
}

async fn user(stores: &SurrealStores<Db>, name: &str) -> Uuid {
    stores
        .users()
        .create(CreateUser {
            username: name.into(),
            email: format!("{name}@example.com"),
        })
        .await
        .unwrap()
        .id
}

async fn root(stores: &SurrealStores<Db>) -> Uuid {
    stores
        .resources()
        .create(CreateResource {
            tenant_id: Uuid::new_v4(),
            parent_id: None,
            resource_type: TENANT_ROOT_TYPE.into(),
            name: "acme".into(),
            path: ROOT_PATH.into(),
        })
        .await
        .unwrap()
        .id
}

// -----------------------------------------------------------------------
// Permissions & roles
// -----------------------------------------------------------------------

#[tokio::test]
async fn permission_names_are_unique() {
    let stores = setup().await;
    permission(&stores, "READ").await;

    let err = stores
        .permissions()
        .create(CreatePermission {
            name: "READ".into(),
            description: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CanopyError::AlreadyExists { .. }));

    let found = stores.permissions().get_by_name("READ").await.unwrap();
    assert_eq!(found.name, "READ");
    assert!(matches!(
        stores.permissions().get_by_name("read").await.unwrap_err(),
        CanopyError::NotFound { .. }
    ));
}

#[tokio::test]
async fn grant_and_revoke_permissions() {
    let stores = setup().await;
    let read = permission(&stores, "READ").await;
    let write = permission(&stores, "WRITE").await;

    let role = stores
        .roles()
        .create("EDITOR", RoleScope::Global, None)
        .await
        .unwrap();
    stores.roles().grant_permission(role.id, read).await.unwrap();
    stores.roles().grant_permission(role.id, write).await.unwrap();

    let names: Vec<String> = stores
        .roles()
        .get_role_permissions(role.id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["READ", "WRITE"]);

    stores.roles().revoke_permission(role.id, write).await.unwrap();
    let remaining = stores.roles().get_role_permissions(role.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "READ");
}

#[tokio::test]
async fn global_and_tenant_role_lookup() {
    let stores = setup().await;
    let tenant_a = Uuid::new_v4();
    let tenant_b = Uuid::new_v4();

    let global = stores
        .roles()
        .create("VIEWER", RoleScope::Global, None)
        .await
        .unwrap();
    let custom = stores
        .roles()
        .create("VIEWER", RoleScope::Tenant, Some(tenant_a))
        .await
        .unwrap();

    let found = stores.roles().find_global_by_name("VIEWER").await.unwrap();
    assert_eq!(found.map(|r| r.id), Some(global.id));

    let found = stores
        .roles()
        .find_by_name_in_tenant("VIEWER", tenant_a)
        .await
        .unwrap();
    assert_eq!(found.map(|r| r.id), Some(custom.id));
    assert!(
        stores
            .roles()
            .find_by_name_in_tenant("VIEWER", tenant_b)
            .await
            .unwrap()
            .is_none()
    );

    assert_eq!(
        stores.roles().list_visible_to_tenant(tenant_a).await.unwrap().len(),
        2
    );
    assert_eq!(
        stores.roles().list_visible_to_tenant(tenant_b).await.unwrap().len(),
        1
    );
    assert_eq!(stores.roles().list().await.unwrap().len(), 2);
}

// -----------------------------------------------------------------------
// Users
// -----------------------------------------------------------------------

#[tokio::test]
async fn create_and_disable_user() {
    let stores = setup().await;
    let id = user(&stores, "alice").await;

    let alice = stores.users().get_by_username("alice").await.unwrap();
    assert_eq!(alice.id, id);
    assert!(alice.enabled);

    let disabled = stores.users().set_enabled(id, false).await.unwrap();
    assert!(!disabled.enabled);
    assert!(!stores.users().get_by_id(id).await.unwrap().enabled);
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let stores = setup().await;
    user(&stores, "alice").await;

    let err = stores
        .users()
        .create(CreateUser {
            username: "alice".into(),
            email: "other@example.com".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CanopyError::AlreadyExists { .. }));
}

// -----------------------------------------------------------------------
// Bindings
// -----------------------------------------------------------------------

#[tokio::test]
async fn bindings_carry_their_role_permissions() {
    let stores = setup().await;
    let read = permission(&stores, "READ").await;
    let delete = permission(&stores, "DELETE").await;
    let alice = user(&stores, "alice").await;
    let resource = root(&stores).await;

    let viewer = stores
        .roles()
        .create("VIEWER", RoleScope::Global, None)
        .await
        .unwrap();
    stores.roles().grant_permission(viewer.id, read).await.unwrap();
    let admin = stores
        .roles()
        .create("ADMIN", RoleScope::Global, None)
        .await
        .unwrap();
    stores.roles().grant_permission(admin.id, read).await.unwrap();
    stores.roles().grant_permission(admin.id, delete).await.unwrap();

    for role_id in [viewer.id, admin.id] {
        stores
            .bindings()
            .create(BindingKey {
                user_id: alice,
                role_id,
                resource_id: resource,
            })
            .await
            .unwrap();
    }

    let bindings = stores.bindings().list_for_user(alice).await.unwrap();
    assert_eq!(bindings.len(), 2);
    let admin_binding = bindings
        .iter()
        .find(|b| b.role_id() == admin.id)
        .expect("admin binding");
    assert_eq!(admin_binding.resource_id, resource);
    assert!(admin_binding.role.grants("DELETE"));
    assert!(admin_binding.role.grants("READ"));

    let viewer_binding = bindings
        .iter()
        .find(|b| b.role_id() == viewer.id)
        .expect("viewer binding");
    assert!(!viewer_binding.role.grants("DELETE"));
}

#[tokio::test]
async fn duplicate_binding_is_rejected_and_delete_is_strict() {
    let stores = setup().await;
    let alice = user(&stores, "alice").await;
    let resource = root(&stores).await;
    let role = stores
        .roles()
        .create("VIEWER", RoleScope::Global, None)
        .await
        .unwrap();
    let key = BindingKey {
        user_id: alice,
        role_id: role.id,
        resource_id: resource,
    };

    stores.bindings().create(key).await.unwrap();
    assert!(stores.bindings().exists(key).await.unwrap());
    assert!(matches!(
        stores.bindings().create(key).await.unwrap_err(),
        CanopyError::AlreadyExists { .. }
    ));

    stores.bindings().delete(key).await.unwrap();
    assert!(!stores.bindings().exists(key).await.unwrap());
    assert!(matches!(
        stores.bindings().delete(key).await.unwrap_err(),
        CanopyError::NotFound { .. }
    ));
}

#[tokio::test]
async fn same_role_may_be_bound_at_several_resources() {
    let stores = setup().await;
    let alice = user(&stores, "alice").await;
    let first = root(&stores).await;
    let second = root(&stores).await;
    let role = stores
        .roles()
        .create("VIEWER", RoleScope::Global, None)
        .await
        .unwrap();

    for resource_id in [first, second] {
        stores
            .bindings()
            .create(BindingKey {
                user_id: alice,
                role_id: role.id,
                resource_id,
            })
            .await
            .unwrap();
    }

    assert_eq!(stores.bindings().list_for_user(alice).await.unwrap().len(), 2);
}

#[tokio::test]
async fn deletes_cascade_to_bindings() {
    let stores = setup().await;
    let alice = user(&stores, "alice").await;
    let bob = user(&stores, "bob").await;
    let resource = root(&stores).await;
    let role = stores
        .roles()
        .create("VIEWER", RoleScope::Global, None)
        .await
        .unwrap();
    let other = stores
        .roles()
        .create("EDITOR", RoleScope::Global, None)
        .await
        .unwrap();

    for (user_id, role_id) in [(alice, role.id), (bob, other.id)] {
        stores
            .bindings()
            .create(BindingKey {
                user_id,
                role_id,
                resource_id: resource,
            })
            .await
            .unwrap();
    }

    stores.roles().delete(role.id).await.unwrap();
    assert!(stores.bindings().list_for_user(alice).await.unwrap().is_empty());

    stores.users().delete(bob).await.unwrap();
    assert!(stores.bindings().list_for_user(bob).await.unwrap().is_empty());
}

#[tokio::test]
async fn user_without_bindings_has_none() {
    let stores = setup().await;
    let alice = user(&stores, "alice").await;

    assert!(stores.bindings().list_for_user(alice).await.unwrap().is_empty());
}
