//! crates/santri_core/src/halaqoh.rs
//!
//! Study circles. Every mutation requires `ManageHalaqoh`.

use uuid::Uuid;

use crate::domain::{Actor, Halaqoh, HalaqohMember};
use crate::error::{DomainError, DomainResult};
use crate::ports::{Clock, HalaqohStore, UserStore};
use crate::rbac::{authorize, Permission};

pub async fn create_halaqoh<S>(
    store: &S,
    actor: &Actor,
    clock: &dyn Clock,
    name: &str,
    ustadz_id: Uuid,
) -> DomainResult<Halaqoh>
where
    S: HalaqohStore + UserStore + ?Sized,
{
    authorize(actor, Permission::ManageHalaqoh)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::Validation("name is required".to_string()));
    }
    store.get_user_by_id(ustadz_id).await?;

    let halaqoh = Halaqoh {
        id: Uuid::new_v4(),
        name: name.to_string(),
        ustadz_id,
        created_at: clock.now(),
    };
    store.insert_halaqoh(halaqoh.clone()).await?;
    tracing::info!(halaqoh = %halaqoh.id, name = %halaqoh.name, "halaqoh created");
    Ok(halaqoh)
}

pub async fn add_member<S>(
    store: &S,
    actor: &Actor,
    clock: &dyn Clock,
    halaqoh_id: Uuid,
    santri_id: Uuid,
) -> DomainResult<HalaqohMember>
where
    S: HalaqohStore + UserStore + ?Sized,
{
    authorize(actor, Permission::ManageHalaqoh)?;
    store.get_halaqoh(halaqoh_id).await?;
    store.get_user_by_id(santri_id).await?;

    store
        .add_member(HalaqohMember {
            halaqoh_id,
            santri_id,
            joined_at: clock.now(),
        })
        .await?;
    // Re-adding keeps the original join date, so read back what is stored.
    store
        .list_members(halaqoh_id)
        .await?
        .into_iter()
        .find(|m| m.santri_id == santri_id)
        .ok_or_else(|| DomainError::Store(format!("member {} vanished after insert", santri_id)))
}

pub async fn remove_member<S>(
    store: &S,
    actor: &Actor,
    halaqoh_id: Uuid,
    santri_id: Uuid,
) -> DomainResult<()>
where
    S: HalaqohStore + ?Sized,
{
    authorize(actor, Permission::ManageHalaqoh)?;
    store.get_halaqoh(halaqoh_id).await?;
    store.remove_member(halaqoh_id, santri_id).await?;
    Ok(())
}

pub async fn list_halaqoh<S>(store: &S) -> DomainResult<Vec<Halaqoh>>
where
    S: HalaqohStore + ?Sized,
{
    Ok(store.list_halaqoh().await?)
}

pub async fn list_members<S>(store: &S, halaqoh_id: Uuid) -> DomainResult<Vec<HalaqohMember>>
where
    S: HalaqohStore + ?Sized,
{
    store.get_halaqoh(halaqoh_id).await?;
    Ok(store.list_members(halaqoh_id).await?)
}
