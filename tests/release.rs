use vdjdb_search::release::first_asset_url;

#[test]
fn picks_first_asset_of_release_payload() {
    let payload = std::fs::read_to_string("tests/fixtures/release_latest.json").unwrap();
    let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
    let url = first_asset_url(&value).unwrap();
    assert!(url.starts_with("https://"));
    assert!(url.ends_with(".zip"));
}
