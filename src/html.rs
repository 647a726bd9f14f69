use super::dom::Dom;
use super::*;

/// Start tags that implicitly close an open element, and the ancestors that
/// stop the search for it.
struct ImpliedEnd {
    opening: &'static [&'static str],
    closes: &'static [&'static str],
    boundaries: &'static [&'static str],
}

const IMPLIED_ENDS: &[ImpliedEnd] = &[
    ImpliedEnd {
        opening: &["li"],
        closes: &["li"],
        boundaries: &["ol", "ul", "menu"],
    },
    ImpliedEnd {
        opening: &["dt", "dd"],
        closes: &["dt", "dd"],
        boundaries: &["dl"],
    },
    ImpliedEnd {
        opening: &["option", "optgroup"],
        closes: &["option"],
        boundaries: &["optgroup", "select", "datalist"],
    },
    ImpliedEnd {
        opening: &["optgroup"],
        closes: &["optgroup"],
        boundaries: &["select"],
    },
    ImpliedEnd {
        opening: &["tr"],
        closes: &["tr"],
        boundaries: &["table", "thead", "tbody", "tfoot"],
    },
    ImpliedEnd {
        opening: &["td", "th"],
        closes: &["td", "th"],
        boundaries: &["tr", "table"],
    },
    ImpliedEnd {
        opening: &[
            "address", "article", "aside", "blockquote", "details", "div", "dl", "fieldset",
            "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
            "header", "hgroup", "hr", "main", "menu", "nav", "ol", "p", "pre", "section",
            "table", "ul",
        ],
        closes: &["p"],
        boundaries: &[],
    },
];

/// Elements whose content is not markup. `escapable` ones still decode
/// character references.
const RAW_TEXT_TAGS: &[(&str, bool)] = &[
    ("script", false),
    ("style", false),
    ("textarea", true),
    ("title", true),
];

pub(crate) fn parse_html(html: &str) -> Result<Dom> {
    let mut dom = Dom::new();
    let mut stack = vec![dom.root];
    let mut lines = LineCounter::new(html.as_bytes());
    let bytes = html.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        if starts_with_at(bytes, i, b"<!--") {
            // An unterminated comment swallows the rest of the document.
            i = find_subslice(bytes, i + 4, b"-->").map_or(bytes.len(), |end| end + 3);
            continue;
        }

        if bytes[i] == b'<' && starts_with_at(bytes, i, b"</") {
            let (tag, next) = parse_end_tag(html, i)?;
            i = next;
            if let Some(open) = stack
                .iter()
                .rposition(|node| dom.has_tag(*node, &tag))
                .filter(|index| *index > 0)
            {
                stack.truncate(open);
            }
            continue;
        }

        if bytes[i] == b'<' && starts_with_at(bytes, i, b"<!") {
            i = parse_declaration_tag(html, i)?;
            continue;
        }

        if bytes[i] == b'<' && bytes.get(i + 1).is_some_and(u8::is_ascii_alphabetic) {
            let line = lines.line_at(i);
            let (tag, attrs, self_closing, next) = parse_start_tag(html, i)?;
            i = next;
            close_implied_end_tags(&dom, &mut stack, &tag);

            let parent = *stack
                .last()
                .ok_or_else(|| Error::HtmlParse("missing parent element".into()))?;
            let node = dom.create_element(parent, tag.clone(), attrs, line);

            if let Some((_, escapable)) = RAW_TEXT_TAGS.iter().find(|(raw, _)| *raw == tag) {
                if self_closing {
                    continue;
                }
                let close = find_case_insensitive_raw_end_tag(bytes, i, tag.as_bytes())
                    .unwrap_or(bytes.len());
                let body = html
                    .get(i..close)
                    .ok_or_else(|| Error::HtmlParse(format!("invalid <{tag}> content")))?;
                let mut body = if *escapable {
                    decode_html_character_references(body)
                } else {
                    body.to_string()
                };
                if tag == "textarea" {
                    body = strip_leading_newline(&body);
                }
                if !body.is_empty() {
                    dom.create_text(node, body);
                }
                i = if close < bytes.len() {
                    parse_end_tag(html, close)?.1
                } else {
                    close
                };
                continue;
            }

            if !self_closing && !is_void_tag(&tag) {
                stack.push(node);
            }
            continue;
        }

        let text_start = i;
        i += 1;
        while i < bytes.len() && bytes[i] != b'<' {
            i += 1;
        }

        if let Some(text) = html.get(text_start..i) {
            let parent = *stack
                .last()
                .ok_or_else(|| Error::HtmlParse("missing parent element".into()))?;
            let mut decoded = decode_html_character_references(text);
            if dom.has_tag(parent, "pre") && dom.children(parent).is_empty() {
                decoded = strip_leading_newline(&decoded);
            }
            if !decoded.is_empty() {
                dom.create_text(parent, decoded);
            }
        }
    }

    Ok(dom)
}

fn close_implied_end_tags(dom: &Dom, stack: &mut Vec<NodeId>, tag: &str) {
    for rule in IMPLIED_ENDS {
        if !rule.opening.contains(&tag) {
            continue;
        }
        for index in (1..stack.len()).rev() {
            let Some(open_tag) = dom.tag_name(stack[index]) else {
                continue;
            };
            if rule.closes.contains(&open_tag) {
                stack.truncate(index);
                break;
            }
            if rule.boundaries.contains(&open_tag) {
                break;
            }
        }
    }
}

struct LineCounter<'a> {
    bytes: &'a [u8],
    offset: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            line: 1,
        }
    }

    fn line_at(&mut self, at: usize) -> usize {
        let end = at.min(self.bytes.len());
        if end > self.offset {
            self.line += self.bytes[self.offset..end]
                .iter()
                .filter(|byte| **byte == b'\n')
                .count();
            self.offset = end;
        }
        self.line
    }
}

fn strip_leading_newline(text: &str) -> String {
    text.strip_prefix("\r\n")
        .or_else(|| text.strip_prefix('\n'))
        .unwrap_or(text)
        .to_string()
}

pub(crate) fn decode_html_character_references(src: &str) -> String {
    if !src.contains('&') {
        return src.to_string();
    }

    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let token_len = tail
            .char_indices()
            .find(|(_, ch)| !(ch.is_ascii_alphanumeric() || *ch == '#'))
            .map_or(tail.len(), |(index, _)| index);
        let token = &tail[..token_len];
        let decoded = match token.strip_prefix('#') {
            Some(numeric) => decode_numeric_reference(numeric),
            None => named_reference(token),
        };

        match decoded {
            Some(ch) if !token.is_empty() => {
                out.push(ch);
                let consumed = if tail[token_len..].starts_with(';') {
                    token_len + 1
                } else {
                    token_len
                };
                rest = &tail[consumed..];
            }
            _ => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_numeric_reference(value: &str) -> Option<char> {
    let codepoint = match value.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => value.parse::<u32>().ok()?,
    };
    char::from_u32(codepoint)
}

fn named_reference(name: &str) -> Option<char> {
    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "euro" => '€',
        "pound" => '£',
        "yen" => '¥',
        "laquo" => '«',
        "raquo" => '»',
        "ldquo" => '“',
        "rdquo" => '”',
        "lsquo" => '‘',
        "rsquo" => '’',
        "hellip" => '…',
        "middot" => '·',
        "ndash" => '–',
        "mdash" => '—',
        "times" => '×',
        "divide" => '÷',
        "deg" => '°',
        "plusmn" => '±',
        _ => return None,
    };
    Some(ch)
}

fn parse_start_tag(html: &str, at: usize) -> Result<(String, Vec<(String, String)>, bool, usize)> {
    let bytes = html.as_bytes();
    let mut i = at + 1;

    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }
    let tag = html
        .get(tag_start..i)
        .ok_or_else(|| Error::HtmlParse("invalid tag name".into()))?
        .to_ascii_lowercase();
    if tag.is_empty() {
        return Err(Error::HtmlParse("empty tag name".into()));
    }

    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;

    loop {
        skip_ws(bytes, &mut i);
        if i >= bytes.len() {
            return Err(Error::HtmlParse(format!("unclosed start tag <{tag}>")));
        }

        if bytes[i] == b'>' {
            i += 1;
            break;
        }

        if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'>') {
            self_closing = true;
            i += 2;
            break;
        }

        if !is_attr_name_char(bytes[i]) {
            // Skip junk such as stray quotes the way browsers recover from it.
            i += 1;
            continue;
        }

        let name_start = i;
        while i < bytes.len() && is_attr_name_char(bytes[i]) {
            i += 1;
        }
        let name = html
            .get(name_start..i)
            .ok_or_else(|| Error::HtmlParse("invalid attribute name".into()))?
            .to_ascii_lowercase();

        skip_ws(bytes, &mut i);
        let value = if bytes.get(i) == Some(&b'=') {
            i += 1;
            skip_ws(bytes, &mut i);
            parse_attr_value(html, bytes, &mut i)?
        } else {
            String::new()
        };

        // Duplicate attributes keep their first occurrence.
        if !attrs.iter().any(|(existing, _)| *existing == name) {
            attrs.push((name, value));
        }
    }

    Ok((tag, attrs, self_closing, i))
}

fn parse_attr_value(html: &str, bytes: &[u8], i: &mut usize) -> Result<String> {
    if *i >= bytes.len() {
        return Err(Error::HtmlParse("missing attribute value".into()));
    }

    if bytes[*i] == b'\'' || bytes[*i] == b'"' {
        let quote = bytes[*i];
        *i += 1;
        let start = *i;
        while *i < bytes.len() && bytes[*i] != quote {
            *i += 1;
        }
        if *i >= bytes.len() {
            return Err(Error::HtmlParse("unclosed quoted attribute value".into()));
        }
        let value = html
            .get(start..*i)
            .ok_or_else(|| Error::HtmlParse("invalid attribute value".into()))?;
        *i += 1;
        return Ok(decode_html_character_references(value));
    }

    let start = *i;
    while *i < bytes.len() && !bytes[*i].is_ascii_whitespace() && bytes[*i] != b'>' {
        *i += 1;
    }
    let value = html
        .get(start..*i)
        .ok_or_else(|| Error::HtmlParse("invalid attribute value".into()))?;
    Ok(decode_html_character_references(value))
}

fn parse_end_tag(html: &str, at: usize) -> Result<(String, usize)> {
    let bytes = html.as_bytes();
    let mut i = at + 2;
    skip_ws(bytes, &mut i);

    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }
    let tag = html
        .get(tag_start..i)
        .ok_or_else(|| Error::HtmlParse("invalid end tag".into()))?
        .to_ascii_lowercase();

    while i < bytes.len() && bytes[i] != b'>' {
        i += 1;
    }
    if i >= bytes.len() {
        return Err(Error::HtmlParse(format!("unclosed end tag </{tag}")));
    }
    Ok((tag, i + 1))
}

fn parse_declaration_tag(html: &str, at: usize) -> Result<usize> {
    let bytes = html.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = at + 2;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(open) if b == open => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if b == b'>' => return Ok(i + 1),
            None => {}
        }
        i += 1;
    }

    Err(Error::HtmlParse("unclosed declaration tag".into()))
}

pub(crate) fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

fn is_tag_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn is_attr_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.' | b'@')
}

fn starts_with_at(bytes: &[u8], at: usize, needle: &[u8]) -> bool {
    bytes
        .get(at..at + needle.len())
        .is_some_and(|window| window == needle)
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

fn find_case_insensitive_raw_end_tag(bytes: &[u8], from: usize, tag: &[u8]) -> Option<usize> {
    let mut i = from;
    while i + 1 < bytes.len() {
        if bytes[i] == b'<' && bytes[i + 1] == b'/' {
            let name_start = i + 2;
            let name_end = name_start + tag.len();
            let matches_tag = bytes
                .get(name_start..name_end)
                .is_some_and(|name| name.eq_ignore_ascii_case(tag));
            let terminated = bytes
                .get(name_end)
                .is_none_or(|after| !after.is_ascii_alphanumeric());
            if matches_tag && terminated {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_start_tag_lines() -> Result<()> {
        let dom = parse_html("<html>\n<body>\n  <form id='a'></form>\n</body></html>")?;
        let form = dom.by_id("a").ok_or_else(|| Error::driver("missing form"))?;
        assert_eq!(dom.line(form), 3);
        Ok(())
    }

    #[test]
    fn implied_end_tags_close_options_and_paragraphs() -> Result<()> {
        let dom = parse_html("<select id='s'><option>a<option>b</select><p>one<p>two")?;
        let select = dom.by_id("s").ok_or_else(|| Error::driver("missing select"))?;
        assert_eq!(dom.children(select).len(), 2);
        let paragraphs = dom
            .all_element_nodes()
            .into_iter()
            .filter(|node| dom.has_tag(*node, "p"))
            .count();
        assert_eq!(paragraphs, 2);
        assert_eq!(dom.node_path(select), "/select");
        Ok(())
    }

    #[test]
    fn stray_end_tag_does_not_unwind_the_stack() -> Result<()> {
        let dom = parse_html("<form id='f'></span><input name='a'></form>")?;
        let form = dom.by_id("f").ok_or_else(|| Error::driver("missing form"))?;
        assert_eq!(dom.children(form).len(), 1);
        Ok(())
    }

    #[test]
    fn textarea_content_is_raw_but_decoded() -> Result<()> {
        let dom = parse_html("<textarea id='t'>\n<b>&amp;</b></textarea>")?;
        let textarea = dom.by_id("t").ok_or_else(|| Error::driver("missing textarea"))?;
        assert_eq!(dom.text_content(textarea), "<b>&</b>");
        Ok(())
    }

    #[test]
    fn decodes_named_and_numeric_references() {
        assert_eq!(decode_html_character_references("a &amp; b"), "a & b");
        assert_eq!(decode_html_character_references("&#65;&#x42;"), "AB");
        assert_eq!(decode_html_character_references("&unknown; &"), "&unknown; &");
    }

    #[test]
    fn valueless_attributes_are_empty_strings() -> Result<()> {
        let dom = parse_html("<input id='c' type='checkbox' checked>")?;
        let input = dom.by_id("c").ok_or_else(|| Error::driver("missing input"))?;
        assert_eq!(dom.attr(input, "checked"), Some(""));
        Ok(())
    }
}
