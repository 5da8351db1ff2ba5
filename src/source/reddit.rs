use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use tracing::info;

use super::{http_client, MessageSource, RawMessage};
use crate::error::SourceError;

/// The `/new` feed of one subreddit.
pub struct RedditFeed {
    id: String,
    url: String,
    client: reqwest::blocking::Client,
}

impl RedditFeed {
    pub fn new(subreddit: &str, timeout_secs: u64) -> Self {
        RedditFeed {
            id: format!("reddit:r/{}", subreddit),
            url: format!("https://www.reddit.com/r/{}/new/.rss", subreddit),
            client: http_client(timeout_secs),
        }
    }
}

impl MessageSource for RedditFeed {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch(&self) -> Result<Vec<RawMessage>, SourceError> {
        info!("Checking {}", self.url);
        let resp = self.client.get(&self.url).send()?;
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_feed(&body, &self.id)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Title,
    Body,
    Link,
    Published,
    Updated,
}

#[derive(Default)]
struct Entry {
    title: String,
    body: String,
    link: String,
    published: String,
    updated: String,
}

impl Entry {
    fn slot(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Body => &mut self.body,
            Field::Link => &mut self.link,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
        }
    }

    fn into_message(self, source_id: &str) -> RawMessage {
        let published_at = parse_timestamp(&self.published).or_else(|| parse_timestamp(&self.updated));
        let text = if self.body.is_empty() {
            self.title
        } else {
            format!("{} {}", self.title, self.body)
        };
        RawMessage {
            text,
            published_at,
            provenance_link: self.link.trim().to_string(),
            source_id: source_id.to_string(),
        }
    }
}

/// Parse an Atom or RSS 2.0 document into messages, in document order.
/// Entry bodies stay as (unescaped) HTML; normalization happens later.
pub fn parse_feed(xml: &str, source_id: &str) -> Result<Vec<RawMessage>, SourceError> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut messages = Vec::new();
    let mut entry: Option<Entry> = None;
    let mut field: Option<Field> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"entry" | b"item" => entry = Some(Entry::default()),
                name => {
                    if let Some(current) = entry.as_mut() {
                        field = field_for(name);
                        if name == b"link" {
                            take_href(&e, current)?;
                        }
                    }
                }
            },
            Event::Empty(e) => {
                if let Some(current) = entry.as_mut() {
                    if e.local_name().as_ref() == b"link" {
                        take_href(&e, current)?;
                    }
                }
            }
            Event::Text(e) => {
                if let (Some(current), Some(f)) = (entry.as_mut(), field) {
                    current.slot(f).push_str(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let (Some(current), Some(f)) = (entry.as_mut(), field) {
                    current.slot(f).push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"entry" | b"item" => {
                    if let Some(done) = entry.take() {
                        messages.push(done.into_message(source_id));
                    }
                    field = None;
                }
                _ => field = None,
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(messages)
}

fn field_for(name: &[u8]) -> Option<Field> {
    match name {
        b"title" => Some(Field::Title),
        b"content" | b"summary" | b"description" => Some(Field::Body),
        b"link" => Some(Field::Link),
        b"published" | b"pubDate" => Some(Field::Published),
        b"updated" => Some(Field::Updated),
        _ => None,
    }
}

/// Atom puts the URL in `<link href="..."/>`, RSS in the element text.
fn take_href(e: &BytesStart, entry: &mut Entry) -> Result<(), SourceError> {
    let attr = e
        .try_get_attribute("href")
        .map_err(|err| SourceError::Parse(err.to_string()))?;
    if let Some(attr) = attr {
        if entry.link.is_empty() {
            entry.link = attr.unescape_value()?.into_owned();
        }
    }
    Ok(())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:media="http://search.yahoo.com/mrss/">
  <category term="Tacticus_Codes" label="r/Tacticus_Codes"/>
  <title>Tacticus_Codes</title>
  <entry>
    <author><name>/u/someone</name></author>
    <content type="html">&lt;div class="md"&gt;&lt;p&gt;New one: NEWCODE24&lt;/p&gt;&lt;/div&gt;</content>
    <id>t3_abc</id>
    <media:thumbnail url="https://example.test/t.jpg"/>
    <link href="https://www.reddit.com/r/Tacticus_Codes/comments/abc/new_code/"/>
    <updated>2024-05-01T10:00:00+00:00</updated>
    <published>2024-05-01T09:30:00+00:00</published>
    <title>Fresh CODE inside</title>
  </entry>
  <entry>
    <link href="https://www.reddit.com/r/Tacticus_Codes/comments/def/"/>
    <updated>2024-04-20T08:00:00Z</updated>
    <title>No body here</title>
  </entry>
</feed>"#;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Codes</title>
  <link>https://example.test/</link>
  <item>
    <title>Weekly codes</title>
    <link>https://example.test/posts/1</link>
    <description><![CDATA[<p>Redeem RSS2CODE today</p>]]></description>
    <pubDate>Wed, 01 May 2024 12:00:00 +0000</pubDate>
  </item>
</channel></rss>"#;

    #[test]
    fn parses_atom_entries() {
        let msgs = parse_feed(ATOM, "reddit:r/Tacticus_Codes").unwrap();
        assert_eq!(msgs.len(), 2);

        let first = &msgs[0];
        assert_eq!(first.source_id, "reddit:r/Tacticus_Codes");
        assert_eq!(
            first.provenance_link,
            "https://www.reddit.com/r/Tacticus_Codes/comments/abc/new_code/"
        );
        assert!(first.text.starts_with("Fresh CODE inside "));
        assert!(first.text.contains("<p>New one: NEWCODE24</p>"));
        assert_eq!(
            first.published_at.unwrap().to_rfc3339(),
            "2024-05-01T09:30:00+00:00"
        );
    }

    #[test]
    fn atom_falls_back_to_updated() {
        let msgs = parse_feed(ATOM, "r").unwrap();
        assert_eq!(msgs[1].text, "No body here");
        assert_eq!(
            msgs[1].published_at.unwrap().to_rfc3339(),
            "2024-04-20T08:00:00+00:00"
        );
    }

    #[test]
    fn parses_rss_items() {
        let msgs = parse_feed(RSS, "rss").unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].provenance_link, "https://example.test/posts/1");
        assert!(msgs[0].text.contains("RSS2CODE"));
        assert!(msgs[0].published_at.is_some());
    }

    #[test]
    fn bad_timestamp_is_none() {
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_feed("<feed><entry><title>x</entry></feed>", "r").is_err());
    }
}
