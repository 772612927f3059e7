//! DescriptionFetcher against a mock HTTP device.

use std::time::Duration;

use revealer_discovery::DescriptionFetcher;

const DESCRIPTION: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <friendlyName>8SMC5-USB (ABC123)</friendlyName>
    <UDN>uuid:40001-ABC123</UDN>
    <presentationURL>ximc_info.html</presentationURL>
  </device>
</root>"#;

fn fetcher() -> DescriptionFetcher {
    DescriptionFetcher::new(Duration::from_secs(1)).expect("client")
}

#[test]
fn a_served_description_is_flattened() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/Basic_info.xml")
        .with_status(200)
        .with_header("content-type", "text/xml")
        .with_body(DESCRIPTION)
        .create();

    let url = format!("{}/Basic_info.xml", server.url());
    let properties = fetcher().fetch(&url).expect("flattened description");

    assert_eq!(
        properties.get("friendlyName").map(String::as_str),
        Some("8SMC5-USB (ABC123)")
    );
    assert_eq!(
        properties.get("UDN").map(String::as_str),
        Some("uuid:40001-ABC123")
    );
    mock.assert();
}

#[test]
fn http_errors_yield_no_properties() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/Basic_info.xml")
        .with_status(404)
        .create();

    let url = format!("{}/Basic_info.xml", server.url());
    assert!(fetcher().fetch(&url).is_none());
}

#[test]
fn a_broken_document_yields_no_properties() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/Basic_info.xml")
        .with_status(200)
        .with_body("<root><device></root>")
        .create();

    let url = format!("{}/Basic_info.xml", server.url());
    assert!(fetcher().fetch(&url).is_none());
}

#[test]
fn an_unreachable_host_yields_no_properties() {
    // Reserved TEST-NET address, nothing listens there.
    assert!(fetcher()
        .fetch("http://192.0.2.1:9/Basic_info.xml")
        .is_none());
}
