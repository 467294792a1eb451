//! Extracts profile descriptors from the Netflix browse page.
//!
//! The page comes in two incompatible shapes: a visible `.choose-profile`
//! list, or a `netflix.falcorCache` blob embedded in an inline script.  The
//! strategies are tried in that order and the first one that finds its
//! anchor wins; they are never merged.  Malformed entries are skipped, not
//! fatal.

use indexmap::IndexMap;
use log::{debug, info};
use scraper::{ElementRef, Html};
use serde_json::Value;

use crate::schema::{ProfileDescriptor, ProfileUid};
use crate::{regex, selector};

const CACHE_MARKER: &str = "netflix.falcorCache";
const AVATAR_WIDTH_BUCKET: &str = "320";

/// Returns the profiles found in the document, or `None` when neither
/// strategy yields any.  Never fails on malformed input.
pub fn extract_profiles(html: &Html) -> Option<Vec<ProfileDescriptor>> {
    let profiles = match structured_list(html) {
        Some(profiles) => {
            info!("Found profiles list in the page");
            profiles
        }
        None => embedded_cache(html),
    };
    (!profiles.is_empty()).then_some(profiles)
}

/// Strategy 1: the visible profile chooser.  `None` means the container is
/// absent altogether; `Some(vec![])` means the container exists but holds no
/// usable entries, in which case the fallback must NOT run.
fn structured_list(html: &Html) -> Option<Vec<ProfileDescriptor>> {
    let container = html.select(selector!(".choose-profile")).next()?;
    let mut profiles = IndexMap::new();
    for entry in container.select(selector!(".profile")) {
        let Some(descriptor) = parse_entry(entry) else {
            debug!("Skipping a profile entry with missing name or identifier");
            continue;
        };
        profiles
            .entry(descriptor.uid.clone())
            .or_insert(descriptor);
    }
    Some(profiles.into_values().collect())
}

fn parse_entry(entry: ElementRef) -> Option<ProfileDescriptor> {
    let name: String = entry
        .select(selector!(".profile-name"))
        .next()?
        .text()
        .collect();
    let icon = entry.select(selector!(".profile-icon")).next()?;
    let uid = icon.value().attr("data-profile-guid")?;
    if name.is_empty() || uid.is_empty() {
        return None;
    }
    let avatar = icon.value().attr("style").and_then(css_url);
    Some(
        ProfileDescriptor::builder()
            .name(decode_entities(&name).into())
            .uid(uid.to_owned().into())
            .avatar(avatar.map(Into::into))
            .build(),
    )
}

/// Pulls the URL out of a style attribute like
/// `background-image: url(https://...); width: 10px`.
fn css_url(style: &str) -> Option<String> {
    let (_, rest) = style.split_once("url(")?;
    let (url, _) = rest.split_once(')')?;
    Some(url.to_owned())
}

/// Strategy 2: the `netflix.falcorCache` assignment inside an inline script.
/// Only the first script containing the marker is considered; if extraction
/// from it fails, the strategy yields nothing rather than scanning further.
fn embedded_cache(html: &Html) -> Vec<ProfileDescriptor> {
    let Some(script) = html
        .select(selector!("script"))
        .map(|script| script.text().collect::<String>())
        .find(|content| content.contains(CACHE_MARKER))
    else {
        return vec![];
    };
    info!("Found falcorCache data in a script tag");
    parse_cache_script(&script).unwrap_or_default()
}

fn parse_cache_script(script: &str) -> Option<Vec<ProfileDescriptor>> {
    let captured = regex!(r"(?s)netflix\.falcorCache\s*=\s*(\{.*?\});")
        .captures(script)?
        .get(1)?
        .as_str();
    let stripped = regex!(r"(?s)/\*.*?\*/|//[^\n]*").replace_all(captured, "");
    let decoded = decode_hex_escapes(stripped.trim());
    let cache: Value = serde_json::from_str(&decoded).ok()?;

    let mut profiles = IndexMap::<ProfileUid, ProfileDescriptor>::new();
    for (uid, profile) in cache.get("profiles")?.as_object()? {
        let Some(name) = profile
            .pointer("/summary/value/profileName")
            .and_then(Value::as_str)
        else {
            continue;
        };
        if uid.is_empty() || name.is_empty() {
            continue;
        }
        let avatar = cache
            .pointer(&format!(
                "/avatars/nf/{uid}/images/byWidth/{AVATAR_WIDTH_BUCKET}/value"
            ))
            .and_then(Value::as_str);
        let descriptor = ProfileDescriptor::builder()
            .name(decode_entities(name).into())
            .uid(uid.clone().into())
            .avatar(avatar.map(|url| url.to_owned().into()))
            .build();
        profiles.entry(descriptor.uid.clone()).or_insert(descriptor);
    }
    Some(profiles.into_values().collect())
}

/// Decodes HTML character references left over after the DOM parse; the page
/// double-encodes profile names, so one round survives into the text.
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let body_len = tail[1..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '#'))
            .unwrap_or(tail.len() - 1);
        let terminated = tail[1 + body_len..].starts_with(';');
        match decode_entity(&tail[1..1 + body_len]) {
            Some(decoded) if terminated => {
                out.push(decoded);
                rest = &tail[2 + body_len..];
            }
            _ => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Numeric references plus the HTML 4 named entities profile names actually
/// contain: the XML five, the full Latin-1 block, and the common punctuation
/// names.
fn decode_entity(entity: &str) -> Option<char> {
    if let Some(num) = entity.strip_prefix('#') {
        let value = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(value);
    }
    Some(match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "iexcl" => '¡',
        "cent" => '¢',
        "pound" => '£',
        "curren" => '¤',
        "yen" => '¥',
        "brvbar" => '¦',
        "sect" => '§',
        "uml" => '¨',
        "copy" => '©',
        "ordf" => 'ª',
        "laquo" => '«',
        "not" => '¬',
        "shy" => '\u{ad}',
        "reg" => '®',
        "macr" => '¯',
        "deg" => '°',
        "plusmn" => '±',
        "sup2" => '²',
        "sup3" => '³',
        "acute" => '´',
        "micro" => 'µ',
        "para" => '¶',
        "middot" => '·',
        "cedil" => '¸',
        "sup1" => '¹',
        "ordm" => 'º',
        "raquo" => '»',
        "frac14" => '¼',
        "frac12" => '½',
        "frac34" => '¾',
        "iquest" => '¿',
        "Agrave" => 'À',
        "Aacute" => 'Á',
        "Acirc" => 'Â',
        "Atilde" => 'Ã',
        "Auml" => 'Ä',
        "Aring" => 'Å',
        "AElig" => 'Æ',
        "Ccedil" => 'Ç',
        "Egrave" => 'È',
        "Eacute" => 'É',
        "Ecirc" => 'Ê',
        "Euml" => 'Ë',
        "Igrave" => 'Ì',
        "Iacute" => 'Í',
        "Icirc" => 'Î',
        "Iuml" => 'Ï',
        "ETH" => 'Ð',
        "Ntilde" => 'Ñ',
        "Ograve" => 'Ò',
        "Oacute" => 'Ó',
        "Ocirc" => 'Ô',
        "Otilde" => 'Õ',
        "Ouml" => 'Ö',
        "times" => '×',
        "Oslash" => 'Ø',
        "Ugrave" => 'Ù',
        "Uacute" => 'Ú',
        "Ucirc" => 'Û',
        "Uuml" => 'Ü',
        "Yacute" => 'Ý',
        "THORN" => 'Þ',
        "szlig" => 'ß',
        "agrave" => 'à',
        "aacute" => 'á',
        "acirc" => 'â',
        "atilde" => 'ã',
        "auml" => 'ä',
        "aring" => 'å',
        "aelig" => 'æ',
        "ccedil" => 'ç',
        "egrave" => 'è',
        "eacute" => 'é',
        "ecirc" => 'ê',
        "euml" => 'ë',
        "igrave" => 'ì',
        "iacute" => 'í',
        "icirc" => 'î',
        "iuml" => 'ï',
        "eth" => 'ð',
        "ntilde" => 'ñ',
        "ograve" => 'ò',
        "oacute" => 'ó',
        "ocirc" => 'ô',
        "otilde" => 'õ',
        "ouml" => 'ö',
        "divide" => '÷',
        "oslash" => 'ø',
        "ugrave" => 'ù',
        "uacute" => 'ú',
        "ucirc" => 'û',
        "uuml" => 'ü',
        "yacute" => 'ý',
        "thorn" => 'þ',
        "yuml" => 'ÿ',
        "OElig" => 'Œ',
        "oelig" => 'œ',
        "Scaron" => 'Š',
        "scaron" => 'š',
        "Yuml" => 'Ÿ',
        "ndash" => '–',
        "mdash" => '—',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "bull" => '•',
        "hellip" => '…',
        "euro" => '€',
        "trade" => '™',
        _ => return None,
    })
}

/// `\xHH` → the corresponding character, the way the page escapes bytes
/// inside the embedded blob.  Invalid sequences are left as-is.
fn decode_hex_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("\\x") {
        out.push_str(&rest[..pos]);
        match rest
            .get(pos + 2..pos + 4)
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        {
            Some(byte) => {
                out.push(char::from(byte));
                rest = &rest[pos + 4..];
            }
            None => {
                out.push_str("\\x");
                rest = &rest[pos + 2..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> Option<Vec<ProfileDescriptor>> {
        extract_profiles(&Html::parse_document(html))
    }

    const STRUCTURED: &str = r#"
        <html><body><div class="choose-profile">
            <div class="profile">
                <span class="profile-name">Tom &amp;amp; Jerry</span>
                <div class="profile-icon" data-profile-guid="GUID-A"
                     style="background-image: url(https://img.example/a.png); width: 10px"></div>
            </div>
            <div class="profile">
                <span class="profile-name">Kids</span>
                <div class="profile-icon" data-profile-guid="GUID-B"></div>
            </div>
            <div class="profile">
                <span class="profile-name">No guid here</span>
                <div class="profile-icon"></div>
            </div>
        </div></body></html>"#;

    #[test]
    fn structured_list_extracts_profiles() {
        let profiles = extract(STRUCTURED).unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].name.as_str(), "Tom & Jerry");
        assert_eq!(profiles[0].uid.as_str(), "GUID-A");
        assert_eq!(
            profiles[0].avatar.as_ref().map(ToString::to_string),
            Some("https://img.example/a.png".to_owned())
        );
        assert_eq!(profiles[1].uid.as_str(), "GUID-B");
        assert_eq!(profiles[1].avatar, None);
    }

    #[test]
    fn empty_chooser_yields_no_profiles_without_fallback() {
        // The container exists, so the embedded-data strategy must not run
        // even though a perfectly good cache blob follows.
        let html = r#"
            <html><body>
                <div class="choose-profile"></div>
                <script>netflix.falcorCache = {"profiles":{"G":{"summary":{"value":{"profileName":"X"}}}}};</script>
            </body></html>"#;
        assert_eq!(extract(html), None);
    }

    const EMBEDDED: &str = r#"
        <html><head>
            <script src="https://assets.example/runtime.js"></script>
            <script>window.netflix = window.netflix || {};</script>
            <script>
                // bootstrap payload
                netflix.falcorCache = {"profiles":{"GUID-1":{"summary":{"value":{"profileName":"Ana\x20Mar\xEDa"}}},"GUID-2":{"summary":{"value":{"profileName":"Kids"}}}},/* avatars keyed by guid */"avatars":{"nf":{"GUID-1":{"images":{"byWidth":{"320":{"value":"https:\x2F\x2Fimg.example\x2F1.png"}}}},"GUID-2":{"images":{"byWidth":{"320":{"value":"https:\x2F\x2Fimg.example\x2F2.png"}}}}}}};
            </script>
        </head><body></body></html>"#;

    #[test]
    fn embedded_cache_extracts_profiles() {
        let profiles = extract(EMBEDDED).unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].name.as_str(), "Ana María");
        assert_eq!(profiles[0].uid.as_str(), "GUID-1");
        assert_eq!(
            profiles[0].avatar.as_ref().map(ToString::to_string),
            Some("https://img.example/1.png".to_owned())
        );
        assert_eq!(profiles[1].name.as_str(), "Kids");
    }

    #[test]
    fn scanning_stops_at_first_marker_script() {
        // The first script carrying the marker is corrupt; a later script
        // has valid data, but it must never be consulted.
        let html = r#"
            <html><head>
                <script>netflix.falcorCache = {"profiles": broken</script>
                <script>netflix.falcorCache = {"profiles":{"G":{"summary":{"value":{"profileName":"X"}}}}};</script>
            </head></html>"#;
        assert_eq!(extract(html), None);
    }

    #[test]
    fn no_strategy_matches() {
        assert_eq!(extract("<html><body><p>hi</p></body></html>"), None);
    }

    #[test]
    fn css_url_extraction() {
        assert_eq!(
            css_url("background-image: url(https://x/y.png); width: 1px"),
            Some("https://x/y.png".to_owned())
        );
        assert_eq!(css_url("width: 1px"), None);
    }

    #[test]
    fn entity_decoding() {
        assert_eq!(decode_entities("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode_entities("&lt;3 &#233;&#x41;"), "<3 éA");
        assert_eq!(decode_entities("fish &chips; &bogus;"), "fish &chips; &bogus;");
        assert_eq!(decode_entities("dangling &"), "dangling &");
    }

    #[test]
    fn named_entity_decoding_covers_accented_names() {
        assert_eq!(decode_entities("Caf&eacute;"), "Café");
        assert_eq!(decode_entities("&Eacute;lodie"), "Élodie");
        assert_eq!(decode_entities("Fran&ccedil;ois &amp; M&uuml;ller"), "François & Müller");
        assert_eq!(decode_entities("Se&ntilde;ora &laquo;&hellip;&raquo;"), "Señora «…»");
        assert_eq!(decode_entities("10&euro; &ndash; ok&trade;"), "10€ – ok™");
    }

    #[test]
    fn accented_name_survives_double_encoding_in_markup() {
        let html = r#"
            <div class="choose-profile"><div class="profile">
                <span class="profile-name">Caf&amp;eacute;</span>
                <div class="profile-icon" data-profile-guid="G"></div>
            </div></div>"#;
        let profiles = extract(html).unwrap();
        assert_eq!(profiles[0].name.as_str(), "Café");
    }

    #[test]
    fn hex_escape_decoding() {
        assert_eq!(decode_hex_escapes(r"a\x2Fb\xED"), "a/bí");
        assert_eq!(decode_hex_escapes(r"bad \xZZ tail"), r"bad \xZZ tail");
    }
}
