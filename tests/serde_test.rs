//! Serialization of the public model, behind the `serde` feature.

#![cfg(feature = "serde")]

mod common;

use common::fixture_path;
use folio::{Book, CoverImage, ParseOptions, parse_file};

#[test]
fn test_book_json_round_trip() {
    let book = parse_file(fixture_path("cp1251.fb2")).unwrap();

    let json = serde_json::to_value(&book).unwrap();
    assert_eq!(json["metadata"]["name"], "Дорога домой");
    assert_eq!(json["metadata"]["release_date"], "2019-03-12");
    assert_eq!(json["metadata"]["sequence"]["number"], 2);
    assert_eq!(json["metadata"]["cover"]["encoding"], "jpeg");
    assert_eq!(json["chapters"][1]["title"], "Глава вторая");

    let back: Book = serde_json::from_value(json).unwrap();
    assert_eq!(back, book);
}

#[test]
fn test_normalizer_config_from_json() {
    let config: folio::NormalizerConfig = serde_json::from_str(
        r#"{"excluded_keywords": ["draft"], "keyword_remaps": [["scifi", "Science fiction"]]}"#,
    )
    .unwrap();
    let options = ParseOptions::default().with_normalizer(config);

    assert_eq!(options.normalizer.normalize_keyword("draft"), "");
    assert_eq!(options.normalizer.normalize_keyword("hard scifi"), "Science fiction");
}

#[test]
fn test_cover_is_canonicalized_on_deserialize() {
    let cover: CoverImage =
        serde_json::from_str(r#"{"encoding": "png", "payload": "iVBO\nRw0K"}"#).unwrap();
    assert_eq!(cover.encoding(), "png");
    assert_eq!(cover.payload(), "data:image/png;base64,iVBORw0K");

    let cover: CoverImage = serde_json::from_str(r#"{"encoding": "", "payload": "abc"}"#).unwrap();
    assert_eq!(cover.payload(), "data:image/jpeg;base64,abc");

    let cover: CoverImage =
        serde_json::from_str(r#"{"encoding": "jpeg", "payload": "data:image/gif;base64,R0lG"}"#)
            .unwrap();
    assert_eq!(cover.encoding(), "gif");
    assert_eq!(cover.payload(), "data:image/gif;base64,R0lG");
}
