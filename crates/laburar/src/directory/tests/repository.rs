use std::sync::Arc;

use serde_json::json;

use super::common::*;
use crate::directory::domain::{ListingId, ListingPatch, ListingStatus};
use crate::directory::filter::ListingFilter;
use crate::directory::repository::{ListingRepository, RepositoryError};
use crate::directory::store::{DocumentStore, LISTINGS_COLLECTION};

#[tokio::test]
async fn created_listing_is_active_and_listed_first() {
    let (repository, _) = memory_repository();
    let mut older = draft();
    older.name = "Ana Torres".to_string();
    repository
        .create_at(older, &stranger(), day(1))
        .await
        .expect("seed older listing");

    let created = repository.create(draft(), &owner()).await.expect("create");

    assert_eq!(created.status, ListingStatus::Active);
    assert_eq!(created.phone, "+5491134567890");
    assert_eq!(created.owner_id, owner());

    let listed = repository
        .list(&ListingFilter::default())
        .await
        .expect("list");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, created.id);
}

#[tokio::test]
async fn list_pushes_category_and_reapplies_remaining_criteria() {
    let (repository, _) = memory_repository();
    let mut painter = draft();
    painter.name = "Ana Torres".to_string();
    painter.categories = vec!["Pintura".to_string()];
    painter.neighborhood = Some("Belgrano".to_string());
    repository
        .create_at(painter, &stranger(), day(2))
        .await
        .expect("painter");
    repository
        .create_at(draft(), &owner(), day(1))
        .await
        .expect("plumber");

    let plumbers = repository
        .list(&ListingFilter::default().category("Plomería"))
        .await
        .expect("list by category");
    assert_eq!(plumbers.len(), 1);
    assert_eq!(plumbers[0].name, "Juan Pérez");

    let in_belgrano = repository
        .list(&ListingFilter::default().neighborhood("belgrano").search("ANA"))
        .await
        .expect("list by neighborhood");
    assert_eq!(in_belgrano.len(), 1);
    assert_eq!(in_belgrano[0].name, "Ana Torres");
}

#[tokio::test]
async fn get_by_id_hides_inactive_and_missing_listings() {
    let (repository, _) = memory_repository();
    let created = repository.create(draft(), &owner()).await.expect("create");

    repository
        .soft_delete(&created.id, &owner())
        .await
        .expect("soft delete");

    assert_eq!(repository.get_by_id(&created.id).await, Ok(None));
    assert_eq!(
        repository
            .get_by_id(&ListingId("does-not-exist".to_string()))
            .await,
        Ok(None)
    );
}

#[tokio::test]
async fn soft_delete_keeps_the_document() {
    let (repository, store) = memory_repository();
    let created = repository.create(draft(), &owner()).await.expect("create");

    repository
        .soft_delete(&created.id, &owner())
        .await
        .expect("soft delete");

    assert_eq!(store.len(LISTINGS_COLLECTION), 1);
    let listed = repository
        .list(&ListingFilter::default())
        .await
        .expect("list");
    assert!(listed.is_empty());

    let mine = repository.list_by_owner(&owner()).await.expect("mine");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].status, ListingStatus::Inactive);
}

#[tokio::test]
async fn non_owner_writes_are_rejected_and_leave_the_record_unchanged() {
    let (repository, _) = memory_repository();
    let created = repository.create(draft(), &owner()).await.expect("create");

    let patch = ListingPatch {
        name: Some("Nombre Ajeno".to_string()),
        ..ListingPatch::default()
    };
    assert_eq!(
        repository.update(&created.id, patch, &stranger()).await,
        Err(RepositoryError::NotAuthorized)
    );
    assert_eq!(
        repository.soft_delete(&created.id, &stranger()).await,
        Err(RepositoryError::NotAuthorized)
    );

    let stored = repository
        .get_by_id(&created.id)
        .await
        .expect("get")
        .expect("still active");
    assert_eq!(stored, created);
}

#[tokio::test]
async fn writes_to_missing_listings_report_not_found() {
    let (repository, _) = memory_repository();
    let missing = ListingId("missing".to_string());

    assert_eq!(
        repository
            .update(&missing, ListingPatch::default(), &owner())
            .await,
        Err(RepositoryError::NotFound)
    );
    assert_eq!(
        repository.soft_delete(&missing, &owner()).await,
        Err(RepositoryError::NotFound)
    );
}

#[tokio::test]
async fn update_merges_fields_and_clears_blank_optionals() {
    let (repository, _) = memory_repository();
    let created = repository.create(draft(), &owner()).await.expect("create");

    let patch = ListingPatch {
        city: Some("Rosario".to_string()),
        company: Some(String::new()),
        ..ListingPatch::default()
    };
    let updated = repository
        .update(&created.id, patch, &owner())
        .await
        .expect("update");
    assert_eq!(updated.city, "Rosario");
    assert_eq!(updated.company, None);

    let stored = repository
        .get_by_id(&created.id)
        .await
        .expect("get")
        .expect("active");
    assert_eq!(stored, updated);
    assert_eq!(stored.name, "Juan Pérez");
}

#[tokio::test]
async fn legacy_owner_fields_are_read() {
    let (repository, store) = memory_repository();
    store
        .add(
            LISTINGS_COLLECTION,
            fields(json!({
                "userId": "legacy-owner",
                "name": "Roberto Silva",
                "city": "Buenos Aires",
                "phone": "111556789012",
                "categories": ["Electricidad"],
                "description": DESCRIPTION,
                "status": "active",
                "createdAt": "2024-11-25T12:00:00Z",
                "whatsappMessage": "Hola Roberto! Necesito un electricista"
            })),
        )
        .await
        .expect("raw insert");
    store
        .add(
            LISTINGS_COLLECTION,
            fields(json!({
                "authorUid": "legacy-owner",
                "name": "Roberto Silva",
                "city": "Buenos Aires",
                "phone": "111556789012",
                "categories": ["Electricidad"],
                "description": DESCRIPTION,
                "status": "inactive",
                "createdAt": "2024-10-01T12:00:00Z"
            })),
        )
        .await
        .expect("raw insert");
    let legacy_owner = crate::auth::UserId("legacy-owner".to_string());
    repository
        .create_at(draft(), &legacy_owner, day(1))
        .await
        .expect("canonical listing");

    let mine = repository
        .list_by_owner(&legacy_owner)
        .await
        .expect("list by owner");
    assert_eq!(mine.len(), 3);
    assert!(mine.iter().all(|listing| listing.owner_id == legacy_owner));
    assert_eq!(mine[0].name, "Juan Pérez");
    assert_eq!(mine[2].status, ListingStatus::Inactive);

    let listed = repository
        .list(&ListingFilter::default().city("buenos"))
        .await
        .expect("list");
    let roberto = listed
        .iter()
        .find(|listing| listing.name == "Roberto Silva")
        .expect("legacy listing browsable");
    assert_eq!(
        roberto.contact_message(),
        "Hola Roberto! Necesito un electricista"
    );
}

#[tokio::test]
async fn custom_category_patch_replaces_only_the_previous_custom_entry() {
    let (repository, _) = memory_repository();
    let mut with_custom = draft();
    with_custom.categories = vec!["Plomería".to_string(), "Otros: Vidriería".to_string()];
    let created = repository
        .create(with_custom, &owner())
        .await
        .expect("create");

    let patch = ListingPatch {
        custom_category: Some("Otros: Tapicería".to_string()),
        ..ListingPatch::default()
    };
    let updated = repository
        .update(&created.id, patch, &owner())
        .await
        .expect("update");
    assert_eq!(updated.categories, vec!["Plomería", "Otros: Tapicería"]);

    let stored = repository
        .get_by_id(&created.id)
        .await
        .expect("get")
        .expect("active");
    assert_eq!(stored, updated);
}

#[tokio::test]
async fn malformed_documents_are_skipped() {
    let (repository, store) = memory_repository();
    store
        .add(
            LISTINGS_COLLECTION,
            fields(json!({ "status": "active", "name": 42 })),
        )
        .await
        .expect("raw insert");
    repository.create(draft(), &owner()).await.expect("create");

    let listed = repository
        .list(&ListingFilter::default())
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Juan Pérez");
}

#[tokio::test]
async fn backend_failures_surface_generic_errors() {
    let repository = ListingRepository::new(Arc::new(UnavailableStore));
    let id = ListingId("any".to_string());

    assert_eq!(
        repository.list(&ListingFilter::default()).await,
        Err(RepositoryError::Load)
    );
    assert_eq!(repository.get_by_id(&id).await, Err(RepositoryError::Load));
    assert_eq!(
        repository.create(draft(), &owner()).await,
        Err(RepositoryError::Save)
    );
    assert_eq!(
        repository
            .update(&id, ListingPatch::default(), &owner())
            .await,
        Err(RepositoryError::Save)
    );
    assert_eq!(
        repository.soft_delete(&id, &owner()).await,
        Err(RepositoryError::Delete)
    );
}
