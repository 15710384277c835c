pub const ELLIPSIS: &str = "…";

/// Font slots used on the poster. Each maps to a face and pixel size in the
/// concrete font set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontRole {
    Month,
    Label,
    Date,
    Event,
}

/// Pixel measurement of rendered text, provided by the drawing surface.
pub trait TextMeasure {
    fn text_width(&self, role: FontRole, text: &str) -> f32;

    /// Nominal line height of `role`, used for vertical centering.
    fn line_height(&self, role: FontRole) -> f32;
}

/// Shortens `text` until it fits `max_width` pixels, marking the cut with an
/// ellipsis. Never returns an empty string for non-empty input.
pub fn fit<M: TextMeasure + ?Sized>(
    text: &str,
    role: FontRole,
    max_width: f32,
    measure: &M,
) -> String {
    if text.is_empty() || measure.text_width(role, text) <= max_width {
        return text.to_owned();
    }

    let mut prefix: Vec<char> = text.chars().collect();
    while !prefix.is_empty() {
        prefix.pop();
        let candidate: String = prefix.iter().collect::<String>() + ELLIPSIS;
        if measure.text_width(role, &candidate) <= max_width {
            return candidate;
        }
    }

    ELLIPSIS.to_owned()
}
