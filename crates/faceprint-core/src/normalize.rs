//! Display names derived from external image ids.

/// Extensions removed from ids, longest first so `.jpeg` never leaves an `e`.
const IMAGE_EXTENSIONS: [&str; 3] = [".jpeg", ".jpg", ".png"];

/// Turn an external image id such as `"Keanu-Reeves.jpg"` into a display
/// name such as `"Keanu reeves"`.
///
/// Separators become spaces, image extensions are removed wherever they
/// occur (ignoring case), and the result is capitalised. Idempotent.
pub fn display_name(external_image_id: &str) -> String {
    let spaced = external_image_id.replace(['-', '_'], " ");
    capitalize(&strip_extensions(spaced))
}

fn strip_extensions(mut s: String) -> String {
    loop {
        // ASCII lowercasing keeps byte offsets aligned with `s`.
        let lower = s.to_ascii_lowercase();
        let hit = IMAGE_EXTENSIONS
            .iter()
            .filter_map(|ext| lower.find(ext).map(|at| (at, ext.len())))
            .min_by_key(|&(at, _)| at);
        match hit {
            Some((at, len)) => s.replace_range(at..at + len, ""),
            None => return s,
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    // Only the first char of a multi-char uppercase mapping stays upper
    // ("ß" becomes "Ss"), otherwise a second pass would change the result.
    let mut upper = first.to_uppercase();
    let mut out: String = upper.next().into_iter().collect();
    out.extend(upper.flat_map(char::to_lowercase));
    out.extend(chars.flat_map(char::to_lowercase));
    out
}
