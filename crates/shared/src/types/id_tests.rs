use super::*;
use rstest::rstest;
use std::str::FromStr;
use uuid::Uuid;

#[test]
fn test_typed_id_from_uuid() {
    let uuid = Uuid::new_v4();
    let id = TenantId::from_uuid(uuid);
    assert_eq!(id.into_inner(), uuid);
}

#[test]
fn test_typed_id_display() {
    let uuid = Uuid::new_v4();
    let id = UserId::from_uuid(uuid);
    assert_eq!(format!("{id}"), uuid.to_string());
}

#[test]
fn test_typed_id_from_str() {
    let uuid = Uuid::new_v4();
    let id = UserId::from_str(&uuid.to_string()).unwrap();
    assert_eq!(id.into_inner(), uuid);
    assert!(UserId::from_str("invalid").is_err());
}

#[rstest]
#[case("10", "10")]
#[case(" 20 ", "20")]
#[case("loja_centro", "loja_centro")]
#[case("SP-001", "SP-001")]
fn test_branch_id_accepts(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(BranchId::from_str(input).unwrap().as_str(), expected);
}

#[rstest]
#[case("")]
#[case("   ")]
#[case("10,20")]
#[case("10|20")]
#[case("'; drop")]
fn test_branch_id_rejects(#[case] input: &str) {
    assert!(BranchId::from_str(input).is_err());
}

#[test]
fn test_branch_id_is_opaque() {
    let a = BranchId::from_str("10").unwrap();
    let b = BranchId::from_str("010").unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_branch_id_serde_is_transparent() {
    let id = BranchId::from_str("10").unwrap();
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"10\"");
    let back: BranchId = serde_json::from_str("\"10\"").unwrap();
    assert_eq!(back, id);
    assert!(serde_json::from_str::<BranchId>("\"\"").is_err());
}
