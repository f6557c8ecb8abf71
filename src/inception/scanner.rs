//! Incremental tag scanner for the Inception Stream Processor.
//!
//! Streamed model output arrives in arbitrary-sized chunks, so a
//! `<sub-query model="ALIAS">...</sub-query>` or `<parallel-query>` block can
//! be split across any number of chunk boundaries — including inside the
//! opening tag itself. [`TagScanner`] holds back anything that might be the
//! start of a tag until it either completes or the held buffer exceeds
//! `max_buffer_bytes`, at which point it is flushed as plain text rather
//! than held indefinitely.

use std::sync::OnceLock;

use regex::Regex;

use super::tags::SubQuery;

const OPENERS: [&str; 2] = ["<sub-query", "<parallel-query"];

fn sub_query_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<sub-query\s+model="([^"]*)">(.*?)</sub-query>"#)
            .expect("static sub-query pattern is valid")
    })
}

fn parallel_query_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<parallel-query>(.*?)</parallel-query>")
            .expect("static parallel-query pattern is valid")
    })
}

fn ask_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<ask\s+model="([^"]*)">(.*?)</ask>"#)
            .expect("static ask pattern is valid")
    })
}

/// One thing the scanner has determined from the buffered stream so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// Plain text, safe to forward to the caller as-is.
    Text(String),
    SubQuery(SubQuery),
    /// A `<parallel-query>` block, already split into its `<ask>` entries.
    ParallelQuery(Vec<SubQuery>),
}

pub struct TagScanner {
    buf: String,
    max_buffer_bytes: usize,
}

impl TagScanner {
    pub fn new(max_buffer_bytes: usize) -> Self {
        Self { buf: String::new(), max_buffer_bytes }
    }

    /// Feed a chunk of streamed text, returning whatever events can already
    /// be determined.
    pub fn feed(&mut self, chunk: &str) -> Vec<ScanEvent> {
        self.buf.push_str(chunk);
        self.drain(false)
    }

    /// Call once the upstream stream has ended to drain anything still held.
    pub fn flush(&mut self) -> Vec<ScanEvent> {
        self.drain(true)
    }

    fn drain(&mut self, at_end: bool) -> Vec<ScanEvent> {
        let mut events = Vec::new();

        loop {
            let sub_match = sub_query_re().find(&self.buf);
            let parallel_match = parallel_query_re().find(&self.buf);

            let earliest = match (sub_match, parallel_match) {
                (Some(s), Some(p)) if p.start() < s.start() => Some((p, true)),
                (Some(s), Some(_)) => Some((s, false)),
                (Some(s), None) => Some((s, false)),
                (None, Some(p)) => Some((p, true)),
                (None, None) => None,
            };

            let Some((m, is_parallel)) = earliest else {
                if at_end {
                    if !self.buf.is_empty() {
                        events.push(ScanEvent::Text(std::mem::take(&mut self.buf)));
                    }
                    return events;
                }

                if self.looks_like_partial_tag() {
                    if self.buf.len() > self.max_buffer_bytes {
                        events.push(ScanEvent::Text(std::mem::take(&mut self.buf)));
                    }
                    return events;
                }

                if !self.buf.is_empty() {
                    events.push(ScanEvent::Text(std::mem::take(&mut self.buf)));
                }
                return events;
            };

            let start = m.start();
            let end = m.end();
            if start > 0 {
                events.push(ScanEvent::Text(self.buf[..start].to_string()));
            }
            let matched = self.buf[start..end].to_string();

            if is_parallel {
                let caps = parallel_query_re().captures(&matched).expect("just matched");
                let inner = &caps[1];
                let asks: Vec<SubQuery> = ask_re()
                    .captures_iter(inner)
                    .map(|c| SubQuery {
                        model_alias: c[1].to_string(),
                        query: c[2].trim().to_string(),
                        raw_match: c[0].to_string(),
                    })
                    .collect();
                events.push(ScanEvent::ParallelQuery(asks));
            } else {
                let caps = sub_query_re().captures(&matched).expect("just matched");
                events.push(ScanEvent::SubQuery(SubQuery {
                    model_alias: caps[1].to_string(),
                    query: caps[2].trim().to_string(),
                    raw_match: matched.clone(),
                }));
            }

            self.buf = self.buf[end..].to_string();
        }
    }

    /// True if the held buffer could still grow into a complete tag — either
    /// an opener has begun but not yet closed, or the buffer's tail is a
    /// prefix of an opener.
    fn looks_like_partial_tag(&self) -> bool {
        OPENERS.iter().any(|opener| self.buf.contains(opener))
            || OPENERS.iter().any(|opener| tail_is_prefix_of(&self.buf, opener))
    }
}

fn tail_is_prefix_of(buf: &str, opener: &str) -> bool {
    let bytes = buf.len();
    let max_check = opener.len().min(bytes);
    for len in 1..=max_check {
        let start = bytes - len;
        if !buf.is_char_boundary(start) {
            continue;
        }
        if opener.starts_with(&buf[start..]) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(alias: &str, query: &str) -> SubQuery {
        SubQuery { model_alias: alias.into(), query: query.into(), raw_match: String::new() }
    }

    #[test]
    fn plain_text_with_no_tag_flushes_immediately() {
        let mut scanner = TagScanner::new(64);
        let events = scanner.feed("just some ordinary text");
        assert_eq!(events, vec![ScanEvent::Text("just some ordinary text".into())]);
    }

    #[test]
    fn complete_tag_in_a_single_chunk_is_recognized() {
        let mut scanner = TagScanner::new(4096);
        let events =
            scanner.feed("before <sub-query model=\"math\">2+2?</sub-query> after");
        assert_eq!(
            events,
            vec![
                ScanEvent::Text("before ".into()),
                ScanEvent::SubQuery(SubQuery {
                    model_alias: "math".into(),
                    query: "2+2?".into(),
                    raw_match: "<sub-query model=\"math\">2+2?</sub-query>".into(),
                }),
                ScanEvent::Text(" after".into()),
            ]
        );
    }

    #[test]
    fn tag_split_across_two_chunks_at_the_opening_bracket() {
        let mut scanner = TagScanner::new(4096);
        let mut all = scanner.feed("hello <sub-query model=\"m");
        all.extend(scanner.feed("ath\">2+2?</sub-query> bye"));
        assert_eq!(
            all,
            vec![
                ScanEvent::Text("hello ".into()),
                ScanEvent::SubQuery(sub("math", "2+2?")),
                ScanEvent::Text(" bye".into()),
            ]
        );
    }

    #[test]
    fn tag_split_at_every_possible_boundary_still_resolves() {
        let full = "intro <sub-query model=\"math\">2+2?</sub-query> outro";
        for split_at in 0..=full.len() {
            if !full.is_char_boundary(split_at) {
                continue;
            }
            let mut scanner = TagScanner::new(4096);
            let mut events = scanner.feed(&full[..split_at]);
            events.extend(scanner.feed(&full[split_at..]));
            events.extend(scanner.flush());

            let text: String = events
                .iter()
                .filter_map(|e| match e {
                    ScanEvent::Text(t) => Some(t.as_str()),
                    _ => None,
                })
                .collect();
            assert_eq!(text, "intro  outro", "split at byte {split_at}");

            let found_sub_query = events.iter().any(|e| matches!(e, ScanEvent::SubQuery(_)));
            assert!(found_sub_query, "split at byte {split_at} lost the sub-query");
        }
    }

    #[test]
    fn partial_tag_held_past_max_buffer_is_flushed_as_plain_text() {
        let mut scanner = TagScanner::new(8);
        let events = scanner.feed("<sub-query model=\"never-closes-even-remotely-long-enough\"");
        // still holding — buffer exceeds 8 bytes, so the safety valve fires.
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ScanEvent::Text(_)));
    }

    #[test]
    fn unterminated_tag_at_stream_end_is_flushed_raw_on_flush() {
        let mut scanner = TagScanner::new(4096);
        assert!(scanner.feed("<sub-query model=\"math\">2+2").is_empty());
        let flushed = scanner.flush();
        assert_eq!(flushed, vec![ScanEvent::Text("<sub-query model=\"math\">2+2".into())]);
    }

    #[test]
    fn parallel_query_block_splits_into_ask_entries() {
        let mut scanner = TagScanner::new(4096);
        let events = scanner.feed(
            "<parallel-query><ask model=\"math\">2+2?</ask><ask model=\"science\">H2O?</ask></parallel-query>",
        );
        assert_eq!(
            events,
            vec![ScanEvent::ParallelQuery(vec![
                sub("math", "2+2?"),
                sub("science", "H2O?"),
            ])]
        );
    }

    #[test]
    fn two_sub_queries_in_sequence_both_resolve() {
        let mut scanner = TagScanner::new(4096);
        let events = scanner.feed(
            "<sub-query model=\"a\">one</sub-query> mid <sub-query model=\"b\">two</sub-query>",
        );
        assert_eq!(
            events,
            vec![
                ScanEvent::SubQuery(sub("a", "one")),
                ScanEvent::Text(" mid ".into()),
                ScanEvent::SubQuery(sub("b", "two")),
            ]
        );
    }
}
