//! メール送信（Resend API）

use pulldown_cmark::{
    CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, TextMergeStream, html,
};
use serde::Serialize;

/// Resend API のエンドポイント
pub(super) const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// API キーを保持する環境変数
pub(super) const RESEND_API_KEY_VAR: &str = "RESEND_API_KEY";

/// 送信するメール（本文は Markdown）
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body_markdown: String,
}

/// Resend API に送る JSON
#[derive(Debug, Serialize)]
pub(super) struct ResendPayload<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: String,
}

impl<'a> ResendPayload<'a> {
    pub(super) fn new(message: &'a EmailMessage) -> Self {
        Self {
            from: &message.from,
            to: vec![&message.to],
            subject: &message.subject,
            html: markdown_to_html(&message.body_markdown),
        }
    }
}

/// 本文中で自動リンクにする URL の接頭辞
const URL_SCHEMES: [&str; 2] = ["https://", "http://"];

/// URL の末尾から取り除く句読点
const URL_TRAILING: &[char] = &['.', ',', ';', ':', '!', '?', ')', '\'', '"'];

/// Markdown を HTML に変換する
///
/// 表と取り消し線に対応し、本文中の素の `http(s)://` URL はリンクにする。
/// 既存のリンク・画像・コードブロックの中は変更しない。
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = TextMergeStream::new(Parser::new_ext(markdown, options));
    let mut rendered = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut rendered, linkify(parser).into_iter());
    rendered
}

fn linkify<'a>(events: impl Iterator<Item = Event<'a>>) -> Vec<Event<'a>> {
    let mut linked = Vec::new();
    // リンク・画像・コードブロックの入れ子の深さ
    let mut opaque = 0usize;

    for event in events {
        match event {
            Event::Start(tag @ (Tag::Link { .. } | Tag::Image { .. } | Tag::CodeBlock(_))) => {
                opaque += 1;
                linked.push(Event::Start(tag));
            }
            Event::End(tag @ (TagEnd::Link | TagEnd::Image | TagEnd::CodeBlock)) => {
                opaque = opaque.saturating_sub(1);
                linked.push(Event::End(tag));
            }
            Event::Text(text) if opaque == 0 => push_linked_text(&mut linked, text),
            other => linked.push(other),
        }
    }
    linked
}

fn push_linked_text<'a>(events: &mut Vec<Event<'a>>, text: CowStr<'a>) {
    if !URL_SCHEMES.iter().any(|scheme| text.contains(scheme)) {
        events.push(Event::Text(text));
        return;
    }

    let mut rest: &str = &text;
    while let Some((start, url)) = next_url(rest) {
        if start > 0 {
            events.push(Event::Text(CowStr::from(rest[..start].to_string())));
        }
        events.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: CowStr::from(url.to_string()),
            title: CowStr::from(""),
            id: CowStr::from(""),
        }));
        events.push(Event::Text(CowStr::from(url.to_string())));
        events.push(Event::End(TagEnd::Link));
        rest = &rest[start + url.len()..];
    }
    if !rest.is_empty() {
        events.push(Event::Text(CowStr::from(rest.to_string())));
    }
}

/// 最初の URL の開始位置と URL 本体を返す（スキームだけのものは URL とみなさない）
fn next_url(text: &str) -> Option<(usize, &str)> {
    let mut offset = 0;
    while offset < text.len() {
        let haystack = &text[offset..];
        let (found, scheme) = URL_SCHEMES
            .iter()
            .filter_map(|scheme| haystack.find(scheme).map(|index| (index, *scheme)))
            .min_by_key(|(index, _)| *index)?;

        let start = offset + found;
        let candidate = &text[start..];
        let end = candidate
            .find(char::is_whitespace)
            .unwrap_or(candidate.len());
        let url = candidate[..end].trim_end_matches(URL_TRAILING);
        if url.len() > scheme.len() {
            return Some((start, url));
        }
        offset = start + scheme.len();
    }
    None
}
