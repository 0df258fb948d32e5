use quick_xml::escape::unescape;
use quick_xml::events::BytesStart;

/// Element name without namespace prefix.
pub(crate) fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

/// Value of the attribute named `name` (ASCII case-insensitive, as MSBuild
/// treats attribute names), with entities unescaped.
pub(crate) fn attribute(element: &BytesStart<'_>, name: &str) -> Option<String> {
    element.attributes().flatten().find_map(|attr| {
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        if !key.eq_ignore_ascii_case(name) {
            return None;
        }
        let raw = String::from_utf8_lossy(&attr.value).into_owned();
        Some(unescape(&raw).map(|v| v.into_owned()).unwrap_or(raw))
    })
}

/// Text content of an element, trimmed.
pub(crate) fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}
