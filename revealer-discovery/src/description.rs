//! Fetching and flattening UPnP description documents.

use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::Reader;

use revealer_registry::UpnpProperties;

use crate::error::DiscoveryError;

/// Pulls a device's description XML over HTTP and flattens it.
///
/// Fetch failure of any kind — unreachable host, non-2xx status, broken
/// XML — yields `None`: the device stays in the table without properties
/// and is tagged not-local. Reachability of the description URL is what
/// separates a device on our subnet from one that merely multicasts here.
pub struct DescriptionFetcher {
    client: reqwest::blocking::Client,
}

impl DescriptionFetcher {
    pub fn new(timeout: Duration) -> Result<Self, DiscoveryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    pub fn fetch(&self, url: &str) -> Option<UpnpProperties> {
        if url.is_empty() {
            return None;
        }
        let response = match self.client.get(url).send() {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(url, %error, "description fetch failed");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::debug!(url, status = %response.status(), "description fetch rejected");
            return None;
        }
        let body = match response.text() {
            Ok(body) => body,
            Err(error) => {
                tracing::debug!(url, %error, "description body unreadable");
                return None;
            }
        };
        flatten_description(&body)
    }
}

/// Flatten a description document into tag-local-name → text.
///
/// Only children and grandchildren of the document element are recorded
/// (the `<device>` block and its fields, plus top-level oddities some
/// firmwares emit). Namespace prefixes are stripped; on duplicate names
/// the later element wins, matching document order.
pub fn flatten_description(xml: &str) -> Option<UpnpProperties> {
    let mut reader = Reader::from_str(xml);
    let mut properties = UpnpProperties::new();
    let mut depth = 0usize;
    // Local name of the most recently opened child/grandchild, if any.
    let mut open: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                depth += 1;
                open = if depth == 2 || depth == 3 {
                    Some(String::from_utf8_lossy(start.local_name().as_ref()).into_owned())
                } else {
                    None
                };
            }
            Ok(Event::Text(text)) => {
                if let Some(name) = &open {
                    match text.unescape() {
                        Ok(value) => {
                            let value = value.trim();
                            if !value.is_empty() {
                                properties.insert(name.clone(), value.to_string());
                            }
                        }
                        Err(error) => {
                            tracing::debug!(element = %name, %error, "unreadable element text");
                        }
                    }
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(name) = &open {
                    let value = String::from_utf8_lossy(&data);
                    let value = value.trim();
                    if !value.is_empty() {
                        properties.insert(name.clone(), value.to_string());
                    }
                }
            }
            Ok(Event::End(_)) => {
                depth = depth.saturating_sub(1);
                open = None;
            }
            Ok(Event::Eof) => break,
            Err(error) => {
                tracing::debug!(%error, "description XML is malformed");
                return None;
            }
            Ok(_) => {}
        }
    }

    Some(properties)
}
