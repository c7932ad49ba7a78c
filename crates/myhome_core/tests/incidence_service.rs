use myhome_core::db::{open_db, open_db_in_memory};
use myhome_core::{
    EmployeeRepository, FsPhotoManager, Geolocation, Incidence, IncidencePriority,
    IncidenceRepository, IncidenceRequest, IncidenceService, IncidenceServiceError,
    IncidenceStatus, IncidenceValidationError, LinkPolicy, NewEmployee, OrganizationRepository,
    PageRequest, Photo, PhotoError, PhotoManager, PhotoResult, PhotoUpload, RepoError,
    SqliteEmployeeRepository, SqliteIncidenceRepository, SqliteOrganizationRepository,
    StaticUserResolver, UserIdentity,
};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::cell::Cell;
use std::path::Path;
use std::time::{Duration, Instant};

fn jpeg(name: &str, bytes: &[u8]) -> PhotoUpload {
    PhotoUpload::new(name, Some("image/jpeg"), bytes.to_vec())
}

fn leak_request() -> IncidenceRequest {
    IncidenceRequest {
        start_date: Some(1_700_000_000_000),
        status: IncidenceStatus::Open,
        priority: IncidencePriority::High,
        ..IncidenceRequest::new("Leak", "Water dripping from the ceiling")
    }
}

fn count_files(dir: &Path) -> usize {
    if !dir.exists() {
        return 0;
    }
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .map(|path| {
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}

fn seed_links(conn: &Connection) -> (i64, i64) {
    let organization = SqliteOrganizationRepository::try_new(conn)
        .unwrap()
        .create("Comunidad Sol")
        .unwrap();
    let employee = SqliteEmployeeRepository::try_new(conn)
        .unwrap()
        .create(&NewEmployee {
            organization_id: Some(organization.id),
            first_name: "Marta".to_string(),
            last_name: "Ruiz".to_string(),
            email: None,
        })
        .unwrap();
    (organization.id, employee.id)
}

/// Stores the first `allowed` uploads, then fails.
struct FailingPhotoManager {
    inner: FsPhotoManager,
    allowed: usize,
    attempts: Cell<usize>,
}

impl PhotoManager for FailingPhotoManager {
    fn attach(&self, incidence: &Incidence, upload: &PhotoUpload) -> PhotoResult<Photo> {
        let attempt = self.attempts.get();
        self.attempts.set(attempt + 1);
        if attempt >= self.allowed {
            return Err(PhotoError::InvalidFileName(upload.file_name.clone()));
        }
        self.inner.attach(incidence, upload)
    }

    fn discard(&self, photo: &Photo) -> PhotoResult<()> {
        self.inner.discard(photo)
    }
}

#[test]
fn location_is_present_only_when_both_coordinates_are_given() {
    let conn = open_db_in_memory().unwrap();
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FsPhotoManager::new(photos.path()),
        StaticUserResolver::anonymous(),
    );

    let cases = [
        (None, None, None),
        (Some(-3.70), None, None),
        (None, Some(40.41), None),
        (
            Some(-3.70),
            Some(40.41),
            Some(Geolocation::new(-3.70, 40.41)),
        ),
    ];
    for (longitude, latitude, expected) in cases {
        let created = service
            .create(&IncidenceRequest {
                longitude,
                latitude,
                ..leak_request()
            })
            .unwrap();
        let loaded = service.get_by_id(created.id.unwrap()).unwrap().unwrap();
        assert_eq!(created.location, expected);
        assert_eq!(loaded.location, expected);
    }
}

#[test]
fn create_then_get_roundtrip_without_photos() {
    let conn = open_db_in_memory().unwrap();
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FsPhotoManager::new(photos.path()),
        StaticUserResolver::anonymous(),
    );

    let request = IncidenceRequest {
        end_date: Some(1_700_000_500_000),
        ..leak_request()
    };
    let created = service.create(&request).unwrap();
    let id = created.id.expect("create assigns an id");

    let loaded = service.get_by_id(id).unwrap().unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.title, "Leak");
    assert_eq!(loaded.description, "Water dripping from the ceiling");
    assert_eq!(loaded.start_date, request.start_date);
    assert_eq!(loaded.end_date, request.end_date);
    assert_eq!(loaded.status, IncidenceStatus::Open);
    assert_eq!(loaded.priority, IncidencePriority::High);
    assert!(loaded.photos.is_empty());
    assert_eq!(count_files(photos.path()), 0);
}

#[test]
fn create_with_files_owns_one_photo_per_file() {
    let conn = open_db_in_memory().unwrap();
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FsPhotoManager::new(photos.path()),
        StaticUserResolver::anonymous(),
    );

    let created = service
        .create(&IncidenceRequest {
            photo_files: vec![
                jpeg("front.jpg", b"front"),
                jpeg("back.jpg", b"back"),
                jpeg("detail.jpg", b"detail"),
            ],
            ..leak_request()
        })
        .unwrap();
    let id = created.id.unwrap();

    assert_eq!(created.photos.len(), 3);
    assert!(created.photos.iter().all(|photo| photo.incidence_id == id));

    let loaded = service.get_by_id(id).unwrap().unwrap();
    assert_eq!(loaded.photos, created.photos);
    assert_eq!(count_files(photos.path()), 3);
}

#[test]
fn update_of_missing_incidence_returns_none() {
    let conn = open_db_in_memory().unwrap();
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FsPhotoManager::new(photos.path()),
        StaticUserResolver::anonymous(),
    );

    let result = service
        .update(&IncidenceRequest {
            id: Some(4_242),
            ..leak_request()
        })
        .unwrap();
    assert!(result.is_none());
}

#[test]
fn update_without_id_is_a_validation_error() {
    let conn = open_db_in_memory().unwrap();
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FsPhotoManager::new(photos.path()),
        StaticUserResolver::anonymous(),
    );

    assert!(matches!(
        service.update(&leak_request()).unwrap_err(),
        IncidenceServiceError::Validation(IncidenceValidationError::MissingId)
    ));
}

#[test]
fn update_changes_fields_but_keeps_links_and_photos() {
    let conn = open_db_in_memory().unwrap();
    let (organization_id, employee_id) = seed_links(&conn);
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FsPhotoManager::new(photos.path()),
        StaticUserResolver::anonymous(),
    );

    let created = service
        .create(&IncidenceRequest {
            organization_id: Some(organization_id),
            employee_id: Some(employee_id),
            longitude: Some(1.0),
            latitude: Some(2.0),
            photo_files: vec![jpeg("before.jpg", b"before")],
            ..leak_request()
        })
        .unwrap();
    let id = created.id.unwrap();

    let summary = service
        .update(&IncidenceRequest {
            id: Some(id),
            status: IncidenceStatus::Resolved,
            priority: IncidencePriority::Low,
            end_date: Some(1_700_000_900_000),
            longitude: Some(5.0),
            organization_id: None,
            employee_id: Some(employee_id + 50),
            photo_files: vec![jpeg("ignored.jpg", b"ignored")],
            ..IncidenceRequest::new("Leak fixed", "Replaced the pipe")
        })
        .unwrap()
        .expect("existing incidence is updated");

    assert_eq!(summary.id, Some(id));
    assert_eq!(summary.title, "Leak fixed");
    assert_eq!(summary.status, IncidenceStatus::Resolved);
    assert_eq!(summary.longitude, None);
    assert_eq!(summary.latitude, None);
    assert!(summary.photos.is_empty());
    assert_eq!(summary.photo_count, 1);

    let loaded = service.get_by_id(id).unwrap().unwrap();
    assert_eq!(loaded.title, "Leak fixed");
    assert_eq!(loaded.description, "Replaced the pipe");
    assert_eq!(loaded.priority, IncidencePriority::Low);
    assert_eq!(loaded.end_date, Some(1_700_000_900_000));
    assert_eq!(loaded.location, None);
    assert_eq!(loaded.organization_id, Some(organization_id));
    assert_eq!(loaded.employee_id, Some(employee_id));
    assert_eq!(loaded.photos, created.photos);
    assert_eq!(count_files(photos.path()), 1);
}

#[test]
fn employee_caller_gets_no_photo_details() {
    let conn = open_db_in_memory().unwrap();
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FsPhotoManager::new(photos.path()),
        StaticUserResolver::new(UserIdentity::new("eva", ["ROLE_USER", "ROLE_EMPLOYEE_X"])),
    );

    let created = service
        .create(&IncidenceRequest {
            photo_files: vec![jpeg("one.jpg", b"1"), jpeg("two.jpg", b"2")],
            ..leak_request()
        })
        .unwrap();

    let summary = service
        .get_by_id_with_visibility(created.id.unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(summary.title, "Leak");
    assert_eq!(summary.photo_count, 2);
    assert!(summary.photos.is_empty());
}

#[test]
fn non_employee_caller_sees_photo_details_in_order() {
    let conn = open_db_in_memory().unwrap();
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FsPhotoManager::new(photos.path()),
        StaticUserResolver::new(UserIdentity::new("adm", ["ROLE_ADMIN", "ROLE_USER"])),
    );

    let created = service
        .create(&IncidenceRequest {
            photo_files: vec![
                jpeg("one.jpg", b"1"),
                jpeg("two.jpg", b"22"),
                jpeg("three.jpg", b"333"),
            ],
            ..leak_request()
        })
        .unwrap();

    let summary = service
        .get_by_id_with_visibility(created.id.unwrap())
        .unwrap()
        .unwrap();
    let expected_ids: Vec<_> = created.photos.iter().map(|photo| photo.id).collect();
    let actual_ids: Vec<_> = summary.photos.iter().map(|photo| photo.id).collect();
    assert_eq!(actual_ids, expected_ids);
}

#[test]
fn anonymous_caller_sees_photo_details() {
    let conn = open_db_in_memory().unwrap();
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FsPhotoManager::new(photos.path()),
        StaticUserResolver::anonymous(),
    );

    let created = service
        .create(&IncidenceRequest {
            photo_files: vec![jpeg("one.jpg", b"1")],
            ..leak_request()
        })
        .unwrap();

    let summary = service
        .get_by_id_with_visibility(created.id.unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(summary.photos.len(), 1);
}

#[test]
fn visibility_read_of_missing_incidence_returns_none() {
    let conn = open_db_in_memory().unwrap();
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FsPhotoManager::new(photos.path()),
        StaticUserResolver::new(UserIdentity::new("eva", ["ROLE_EMPLOYEE"])),
    );

    assert!(service.get_by_id_with_visibility(31_337).unwrap().is_none());
}

#[test]
fn create_then_visibility_read_matches_attached_files() {
    let conn = open_db_in_memory().unwrap();
    let photos = tempfile::tempdir().unwrap();
    let manager = FsPhotoManager::new(photos.path());
    let service = IncidenceService::new(&conn, &manager, StaticUserResolver::anonymous());

    let uploads = vec![
        PhotoUpload::new("kitchen.png", Some("image/png"), b"png-bytes".to_vec()),
        PhotoUpload::new("sink.jpg", None, b"jpeg".to_vec()),
    ];
    let created = service
        .create(&IncidenceRequest {
            photo_files: uploads.clone(),
            ..leak_request()
        })
        .unwrap();

    let summary = service
        .get_by_id_with_visibility(created.id.unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(summary.photos.len(), uploads.len());
    for ((detail, upload), photo) in summary.photos.iter().zip(&uploads).zip(&created.photos) {
        assert_eq!(detail.file_name, upload.file_name);
        assert_eq!(detail.content_type, upload.content_type);
        assert_eq!(detail.size_bytes, upload.bytes.len() as u64);
        assert_eq!(manager.read(photo).unwrap(), upload.bytes);
    }
}

#[test]
fn delete_then_get_returns_none_and_discards_binaries() {
    let conn = open_db_in_memory().unwrap();
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FsPhotoManager::new(photos.path()),
        StaticUserResolver::anonymous(),
    );

    let created = service
        .create(&IncidenceRequest {
            photo_files: vec![jpeg("gone.jpg", b"gone")],
            ..leak_request()
        })
        .unwrap();
    let id = created.id.unwrap();
    assert_eq!(count_files(photos.path()), 1);

    service.delete(id).unwrap();
    assert!(service.get_by_id(id).unwrap().is_none());
    assert!(service.get_by_id_with_visibility(id).unwrap().is_none());
    assert_eq!(count_files(photos.path()), 0);

    service.delete(id).unwrap();
}

#[test]
fn unresolved_links_are_left_unset_by_default() {
    let conn = open_db_in_memory().unwrap();
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FsPhotoManager::new(photos.path()),
        StaticUserResolver::anonymous(),
    );
    assert_eq!(service.link_policy(), LinkPolicy::Lenient);

    let created = service
        .create(&IncidenceRequest {
            organization_id: Some(404),
            employee_id: Some(405),
            ..leak_request()
        })
        .unwrap();
    let loaded = service.get_by_id(created.id.unwrap()).unwrap().unwrap();
    assert_eq!(loaded.organization_id, None);
    assert_eq!(loaded.employee_id, None);
}

#[test]
fn resolved_links_are_stored() {
    let conn = open_db_in_memory().unwrap();
    let (organization_id, employee_id) = seed_links(&conn);
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FsPhotoManager::new(photos.path()),
        StaticUserResolver::anonymous(),
    );

    let created = service
        .create(&IncidenceRequest {
            organization_id: Some(organization_id),
            employee_id: Some(employee_id),
            ..leak_request()
        })
        .unwrap();
    assert_eq!(created.organization_id, Some(organization_id));
    assert_eq!(created.employee_id, Some(employee_id));
}

#[test]
fn strict_link_policy_fails_and_persists_nothing() {
    let conn = open_db_in_memory().unwrap();
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FsPhotoManager::new(photos.path()),
        StaticUserResolver::anonymous(),
    )
    .with_link_policy(LinkPolicy::Strict);

    let err = service
        .create(&IncidenceRequest {
            organization_id: Some(404),
            ..leak_request()
        })
        .unwrap_err();
    assert!(matches!(err, IncidenceServiceError::OrganizationNotFound(404)));

    let err = service
        .create(&IncidenceRequest {
            employee_id: Some(405),
            ..leak_request()
        })
        .unwrap_err();
    assert!(matches!(err, IncidenceServiceError::EmployeeNotFound(405)));

    let page = service.list_page(&PageRequest::default()).unwrap();
    assert_eq!(page.total_items, 0);
}

#[test]
fn photo_attach_failure_rolls_back_the_whole_create() {
    let conn = open_db_in_memory().unwrap();
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FailingPhotoManager {
            inner: FsPhotoManager::new(photos.path()),
            allowed: 2,
            attempts: Cell::new(0),
        },
        StaticUserResolver::anonymous(),
    );

    let err = service
        .create(&IncidenceRequest {
            photo_files: vec![
                jpeg("ok-1.jpg", b"1"),
                jpeg("ok-2.jpg", b"2"),
                jpeg("boom.jpg", b"3"),
            ],
            ..leak_request()
        })
        .unwrap_err();
    assert!(matches!(err, IncidenceServiceError::Photo(_)));

    let page = service.list_page(&PageRequest::default()).unwrap();
    assert_eq!(page.total_items, 0);
    let photo_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM photos;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(photo_rows, 0);
    assert_eq!(count_files(photos.path()), 0);
}

#[test]
fn empty_upload_fails_create() {
    let conn = open_db_in_memory().unwrap();
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FsPhotoManager::new(photos.path()),
        StaticUserResolver::anonymous(),
    );

    let err = service
        .create(&IncidenceRequest {
            photo_files: vec![jpeg("empty.jpg", b"")],
            ..leak_request()
        })
        .unwrap_err();
    assert!(matches!(
        err,
        IncidenceServiceError::Photo(PhotoError::EmptyUpload { .. })
    ));
    assert!(service.list_page(&PageRequest::default()).unwrap().items.is_empty());
}

#[test]
fn blank_title_is_rejected_before_anything_is_stored() {
    let conn = open_db_in_memory().unwrap();
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FsPhotoManager::new(photos.path()),
        StaticUserResolver::anonymous(),
    );

    let err = service
        .create(&IncidenceRequest {
            photo_files: vec![jpeg("a.jpg", b"a")],
            ..IncidenceRequest::new("  ", "no title")
        })
        .unwrap_err();
    assert!(matches!(
        err,
        IncidenceServiceError::Validation(IncidenceValidationError::BlankTitle)
    ));
    assert_eq!(count_files(photos.path()), 0);
}

#[test]
fn caller_supplied_id_is_kept_and_duplicates_fail_in_storage() {
    let conn = open_db_in_memory().unwrap();
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FsPhotoManager::new(photos.path()),
        StaticUserResolver::anonymous(),
    );

    let request = IncidenceRequest {
        id: Some(500),
        photo_files: vec![jpeg("a.jpg", b"a")],
        ..leak_request()
    };
    let created = service.create(&request).unwrap();
    assert_eq!(created.id, Some(500));
    assert_eq!(created.photos[0].incidence_id, 500);

    let err = service.create(&request).unwrap_err();
    assert!(matches!(err, IncidenceServiceError::Storage(RepoError::Db(_))));

    let loaded = service.get_by_id(500).unwrap().unwrap();
    assert_eq!(loaded.photos, created.photos);
}

#[test]
fn list_page_returns_summaries_without_photo_details() {
    let conn = open_db_in_memory().unwrap();
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FsPhotoManager::new(photos.path()),
        StaticUserResolver::anonymous(),
    );

    for index in 0..3 {
        service
            .create(&IncidenceRequest {
                photo_files: vec![jpeg("p.jpg", b"p")],
                ..IncidenceRequest::new(format!("Ticket {index}"), "")
            })
            .unwrap();
    }

    let page = service.list_page(&PageRequest::new(0, 2)).unwrap();
    assert_eq!(page.total_items, 3);
    assert_eq!(page.size, 2);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].title, "Ticket 0");
    assert!(page
        .items
        .iter()
        .all(|item| item.photos.is_empty() && item.photo_count == 1));
}

#[test]
fn summary_serializes_enums_in_snake_case() {
    let conn = open_db_in_memory().unwrap();
    let photos = tempfile::tempdir().unwrap();
    let service = IncidenceService::new(
        &conn,
        FsPhotoManager::new(photos.path()),
        StaticUserResolver::anonymous(),
    );

    let created = service
        .create(&IncidenceRequest {
            status: IncidenceStatus::InProgress,
            ..leak_request()
        })
        .unwrap();
    let summary = service
        .get_by_id_with_visibility(created.id.unwrap())
        .unwrap()
        .unwrap();

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["status"], "in_progress");
    assert_eq!(json["priority"], "high");
    assert_eq!(json["photos"], serde_json::json!([]));
}

#[test]
fn readers_see_last_committed_state_while_a_write_is_open() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("myhome.sqlite3");
    let writer_conn = open_db(&db_path).unwrap();
    let reader_conn = open_db(&db_path).unwrap();
    let photos = dir.path().join("photos");

    let writer = IncidenceService::new(
        &writer_conn,
        FsPhotoManager::new(&photos),
        StaticUserResolver::anonymous(),
    );
    let reader = IncidenceService::new(
        &reader_conn,
        FsPhotoManager::new(&photos),
        StaticUserResolver::anonymous(),
    );
    let committed = writer.create(&leak_request()).unwrap();
    let id = committed.id.unwrap();

    let tx = Transaction::new_unchecked(&writer_conn, TransactionBehavior::Immediate).unwrap();
    {
        let incidences = SqliteIncidenceRepository::try_new(&tx).unwrap();
        let mut pending = committed.clone();
        pending.title = "Leak fixed".to_string();
        incidences.save(&pending).unwrap();
        incidences
            .insert(&Incidence::new("Half-created", "not committed yet"))
            .unwrap();
    }

    let started_at = Instant::now();
    let seen = reader.get_by_id(id).unwrap().unwrap();
    let page = reader.list_page(&PageRequest::default()).unwrap();
    assert!(started_at.elapsed() < Duration::from_secs(1));
    assert_eq!(seen.title, "Leak");
    assert_eq!(page.total_items, 1);
    assert!(page.items.iter().all(|item| item.title != "Half-created"));

    tx.commit().unwrap();
    assert_eq!(reader.get_by_id(id).unwrap().unwrap().title, "Leak fixed");
    assert_eq!(reader.list_page(&PageRequest::default()).unwrap().total_items, 2);
}
