use cloner_core::normalize_url;

#[test]
fn bare_host_gets_http_prefix() {
    assert_eq!(normalize_url("ex.com"), "http://ex.com");
    assert_eq!(normalize_url("ex.com/path?q=1"), "http://ex.com/path?q=1");
}

#[test]
fn existing_scheme_is_left_alone() {
    assert_eq!(normalize_url("http://ex.com/"), "http://ex.com/");
    assert_eq!(normalize_url("https://ex.com/a"), "https://ex.com/a");
}

#[test]
fn prefix_is_added_exactly_once() {
    let once = normalize_url("example.org");
    let twice = normalize_url(&once);
    assert_eq!(once, twice);
    assert_eq!(once.matches("http://").count(), 1);
}

#[test]
fn whitespace_and_protocol_relative_input() {
    assert_eq!(normalize_url("  ex.com  "), "http://ex.com");
    assert_eq!(normalize_url("//cdn.ex.com/x.js"), "http://cdn.ex.com/x.js");
}
