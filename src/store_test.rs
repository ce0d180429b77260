use super::*;
use crate::types::Role;

fn credential() -> PersistedCredential {
    PersistedCredential {
        access_token: "access-1".into(),
        refresh_token: "refresh-1".into(),
        identity: Identity { id: "u1".into(), role: Role::Admin },
    }
}

fn temp_store() -> FileCredentialStore {
    let dir = std::env::temp_dir().join(format!("taskdesk-store-{}", uuid::Uuid::new_v4()));
    FileCredentialStore::new(dir.join("credentials.json"))
}

// =============================================================================
// decode_entries
// =============================================================================

#[test]
fn decode_all_absent_is_empty() {
    assert!(decode_entries(None, None, None).unwrap().is_none());
}

#[test]
fn decode_partial_is_corrupt() {
    let err = decode_entries(Some("a".into()), None, None).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
    let err = decode_entries(Some("a".into()), Some("r".into()), None).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
}

#[test]
fn decode_bad_identity_is_corrupt() {
    let err = decode_entries(Some("a".into()), Some("r".into()), Some("{not json".into())).unwrap_err();
    assert!(err.to_string().contains("identity"));
}

#[test]
fn decode_unknown_role_is_corrupt() {
    let identity = r#"{"id":"u1","role":"root"}"#.to_owned();
    assert!(decode_entries(Some("a".into()), Some("r".into()), Some(identity)).is_err());
}

#[test]
fn decode_empty_token_is_corrupt() {
    let identity = r#"{"id":"u1","role":"user"}"#.to_owned();
    assert!(decode_entries(Some(String::new()), Some("r".into()), Some(identity)).is_err());
}

// =============================================================================
// MemoryCredentialStore
// =============================================================================

#[test]
fn memory_save_then_load() {
    let store = MemoryCredentialStore::new();
    store.save(&credential());
    assert_eq!(store.load(), Some(credential()));
    assert_eq!(store.raw(IDENTITY_KEY).as_deref(), Some(r#"{"id":"u1","role":"admin"}"#));
}

#[test]
fn memory_clear_removes_all_three_keys() {
    let store = MemoryCredentialStore::with_credential(&credential());
    store.clear();
    assert!(store.is_empty());
    assert_eq!(store.load(), None);
}

#[test]
fn memory_corrupt_identity_loads_as_empty() {
    let store = MemoryCredentialStore::with_credential(&credential());
    store.set_raw(IDENTITY_KEY, "garbage");
    assert_eq!(store.load(), None);
}

#[test]
fn memory_save_overwrites_previous_credential() {
    let store = MemoryCredentialStore::with_credential(&credential());
    let mut next = credential();
    next.access_token = "access-2".into();
    next.identity.role = Role::User;
    store.save(&next);
    assert_eq!(store.load(), Some(next));
}

// =============================================================================
// FileCredentialStore
// =============================================================================

#[test]
fn file_missing_loads_as_empty() {
    let store = temp_store();
    assert_eq!(store.load(), None);
}

#[test]
fn file_save_then_load_round_trip() {
    let store = temp_store();
    store.save(&credential());
    assert_eq!(store.load(), Some(credential()));
    assert!(!store.temp_path().exists());
    store.clear();
}

#[test]
fn file_clear_removes_document() {
    let store = temp_store();
    store.save(&credential());
    store.clear();
    assert!(!store.path().exists());
    assert_eq!(store.load(), None);
    // Second clear is a no-op.
    store.clear();
}

#[test]
fn file_garbage_loads_as_empty() {
    let store = temp_store();
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), "not json at all").unwrap();
    assert_eq!(store.load(), None);
    store.clear();
}

#[test]
fn file_partial_document_loads_as_empty() {
    let store = temp_store();
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), r#"{"accessToken":"a"}"#).unwrap();
    assert_eq!(store.load(), None);
    store.clear();
}

#[test]
fn file_failed_write_removes_temp_file() {
    let store = temp_store();
    // A non-empty directory at the target path makes the final rename fail.
    std::fs::create_dir_all(store.path().join("occupied")).unwrap();

    store.save(&credential());

    assert!(!store.temp_path().exists());
    assert!(store.path().is_dir());
    std::fs::remove_dir_all(store.path().parent().unwrap()).unwrap();
}

#[cfg(unix)]
#[test]
fn file_is_private_to_owner() {
    use std::os::unix::fs::PermissionsExt as _;
    let store = temp_store();
    store.save(&credential());
    let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    store.clear();
}
