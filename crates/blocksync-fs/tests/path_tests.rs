use blocksync_fs::NormalizedPath;
use rstest::rstest;

#[rstest]
#[case("foo/bar/baz", "foo/bar/baz")]
#[case("foo\\bar\\baz", "foo/bar/baz")]
#[case("foo/bar\\baz", "foo/bar/baz")]
#[case("foo//bar/", "foo/bar")]
#[case("PLC_1/./types", "PLC_1/types")]
#[case("a/../b", "b")]
#[case("../../a/b", "a/b")]
fn test_normalization(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(NormalizedPath::new(input).as_str(), expected);
}

#[test]
fn test_join_multi_segment() {
    let base = NormalizedPath::new("/out");
    let joined = base.join("PLC_1/types/Common");
    assert_eq!(joined.as_str(), "/out/PLC_1/types/Common");
}

#[test]
fn test_join_onto_empty_base() {
    let joined = NormalizedPath::new("").join("meta/manifest.json");
    assert_eq!(joined.as_str(), "meta/manifest.json");
}

#[test]
fn test_strip_prefix_yields_relative_path() {
    let root = NormalizedPath::new("/out/project");
    let file = root.join("PLC_1/blocks/Motor__0011aabb.xml");
    assert_eq!(file.strip_prefix(&root), Some("PLC_1/blocks/Motor__0011aabb.xml"));
    assert_eq!(root.strip_prefix(&root), None);
    assert_eq!(NormalizedPath::new("/elsewhere/x").strip_prefix(&root), None);
}

#[test]
fn test_file_name_and_extension() {
    let path = NormalizedPath::new("PLC_1/types/Alarms__0a1b2c3d.xml");
    assert_eq!(path.file_name(), Some("Alarms__0a1b2c3d.xml"));
    assert_eq!(path.extension(), Some("xml"));
}

#[test]
fn test_hidden_file_has_no_extension() {
    assert_eq!(NormalizedPath::new("meta/.lock").extension(), None);
}
