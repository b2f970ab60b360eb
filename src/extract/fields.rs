use once_cell::sync::Lazy;
use regex::Regex;

static ORDER_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Order ID:\s*(\d+)").expect("order id pattern"));

static TRACKING: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)Tracking\s*Number:?\s*([A-Za-z0-9]+)").expect("tracking pattern"),
        Regex::new(r"(?i)Tracking:?\s*([A-Za-z0-9]+)").expect("tracking pattern"),
        Regex::new(r"(?i)TRK\s*#:?\s*([A-Za-z0-9]+)").expect("tracking pattern"),
    ]
});

static QTY_TOTAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Qty\s+Total:\s+(\d+)").expect("qty total pattern"));

pub fn extract_order_id(text: &str) -> Option<String> {
    ORDER_ID
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// First hit wins; patterns go from most to least specific.
pub fn extract_tracking_number(text: &str) -> Option<String> {
    TRACKING.iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    })
}

/// `Qty Total:` value, or 0 when the slip has none.
pub fn extract_qty_total(text: &str) -> u32 {
    QTY_TOTAL
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

pub fn is_hazmat(text: &str, keywords: &[String]) -> bool {
    let haystack = text.to_lowercase();
    keywords
        .iter()
        .map(|keyword| keyword.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .any(|keyword| haystack.contains(&keyword))
}
