use crate::game::round::RoundSummary;
use log::warn;
use qrcodegen::{QrCode, QrCodeEcc};
use url::Url;

const COMPOSE_URL: &str = "https://warpcast.com/~/compose";
const APP_URL: &str = "https://gridshot.dev/";
const APP_IMAGE_URL: &str = "https://gridshot.dev/logo.png";

// Quiet zone around the QR, in modules.
const QR_BORDER_MODULES: i32 = 2;

pub fn share_text(summary: &RoundSummary) -> String {
    format!(
        "I scored {} points in Gridshot! Think you can beat that?",
        summary.score
    )
}

/// Builds the composer link with the message and app embeds as
/// percent-encoded query parameters. `None` when the link can't be built;
/// the caller falls back to showing the plain message.
pub fn compose_share_url(summary: &RoundSummary) -> Option<Url> {
    let text = share_text(summary);
    match Url::parse_with_params(
        COMPOSE_URL,
        &[
            ("text", text.as_str()),
            ("embeds[]", APP_IMAGE_URL),
            ("embeds[]", APP_URL),
        ],
    ) {
        Ok(url) => Some(url),
        Err(e) => {
            warn!("Failed to build share link: {e}");
            None
        }
    }
}

/// Renders `content` as a QR code using half-block glyphs, two modules per
/// text row. Colors are inverted (light modules are drawn) so the code
/// scans against a dark terminal background. Empty when encoding fails.
pub fn share_qr_lines(content: &str) -> Vec<String> {
    let qr = match QrCode::encode_text(content, QrCodeEcc::Medium) {
        Ok(qr) => qr,
        Err(e) => {
            warn!("Failed to encode share QR: {e}");
            return Vec::new();
        }
    };

    let border = QR_BORDER_MODULES;
    let size = qr.size();
    let width = (size + border * 2) as usize;
    let mut lines = Vec::with_capacity(width.div_ceil(2));

    // get_module treats out-of-range coordinates as light, which covers
    // both the quiet zone and the odd final row.
    let mut y = -border;
    while y < size + border {
        let mut line = String::with_capacity(width * 3);
        for x in -border..size + border {
            let top_dark = qr.get_module(x, y);
            let bottom_dark = qr.get_module(x, y + 1);
            line.push(match (top_dark, bottom_dark) {
                (false, false) => '█',
                (false, true) => '▀',
                (true, false) => '▄',
                (true, true) => ' ',
            });
        }
        lines.push(line);
        y += 2;
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::{compose_share_url, share_qr_lines, share_text};
    use crate::game::round::RoundSummary;
    use chrono::Utc;

    fn summary(score: u32) -> RoundSummary {
        RoundSummary {
            score,
            targets_hit: score / 10,
            max_hits: 20,
            total_boxes: 20,
            ended_at: Utc::now(),
        }
    }

    #[test]
    fn share_text_carries_the_final_score() {
        assert!(share_text(&summary(120)).contains("120"));
        assert!(share_text(&summary(0)).contains('0'));
    }

    #[test]
    fn compose_url_percent_encodes_the_message() {
        let url = compose_share_url(&summary(120)).expect("share link should build");
        assert_eq!(url.host_str(), Some("warpcast.com"));

        let query = url.query().expect("share link must carry a query");
        assert!(!query.contains(' '), "query must be fully encoded: {query}");

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].0, "text");
        assert!(pairs[0].1.contains("120 points"));
        assert!(pairs.iter().skip(1).all(|(k, _)| k == "embeds[]"));
    }

    #[test]
    fn qr_rendering_is_rectangular_and_non_empty() {
        let lines = share_qr_lines("https://gridshot.dev/");
        assert!(!lines.is_empty());
        let width = lines[0].chars().count();
        assert!(width >= 21, "QR narrower than the smallest version: {width}");
        assert!(
            lines.iter().all(|l| l.chars().count() == width),
            "all QR rows must share one width"
        );
    }
}
