pub(crate) const XMP_SIGNATURE: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

/// Extracts `dc:description` from an XMP packet, preferring the `x-default`
/// language alternative.
pub(crate) fn description(packet: &str) -> Option<String> {
    if let Some(value) = attribute_value(packet, "dc:description") {
        return non_blank(unescape(value));
    }

    let start = packet.find("<dc:description")?;
    let end = packet[start..]
        .find("</dc:description>")
        .map_or(packet.len(), |offset| start + offset);
    let element = &packet[start..end];

    let items: Vec<(&str, &str)> = list_items(element).collect();
    let (_, text) = items
        .iter()
        .find(|(attrs, _)| attrs.contains("x-default"))
        .or_else(|| items.first())?;
    non_blank(unescape(text))
}

/// `(attributes, text)` of each `rdf:li` child.
fn list_items(element: &str) -> impl Iterator<Item = (&str, &str)> {
    element.split("<rdf:li").skip(1).filter_map(|item| {
        let tag_end = item.find('>')?;
        let attrs = &item[..tag_end];
        if attrs.ends_with('/') {
            return None;
        }
        let body = &item[tag_end + 1..];
        let text_end = body.find("</rdf:li>")?;
        Some((attrs, &body[..text_end]))
    })
}

/// Short form: `<rdf:Description dc:description="...">`.
fn attribute_value<'a>(packet: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("{name}=\"");
    let start = packet.find(&needle)? + needle.len();
    let end = packet[start..].find('"')?;
    Some(&packet[start..start + end])
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#10;", "\n")
        .replace("&amp;", "&")
}

fn non_blank(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
