use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use state::InitCell;

use super::named::named_color;

/// Unparsable colors resolve to white.
const FALLBACK: [f32; 3] = [1.0, 1.0, 1.0];

type Cache = HashMap<String, [f32; 3]>;

static CACHE: InitCell<Mutex<Cache>> = InitCell::new();

fn cache() -> &'static Mutex<Cache> {
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn lock() -> MutexGuard<'static, Cache> {
    // A panic while holding the lock cannot leave a half-written entry behind,
    // so a poisoned cache is still usable.
    cache().lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolves a CSS color string to normalized RGB in `[0, 1]`.
///
/// Results are memoized in an unbounded process-wide cache keyed by the exact
/// input string. Alpha components are parsed and discarded; point opacity is
/// carried separately.
pub fn resolve_color(css: &str) -> [f32; 3] {
    resolver().resolve(css)
}

/// Drops every memoized entry.
pub fn clear_cache() {
    lock().clear();
}

/// Number of memoized entries.
pub fn cache_len() -> usize {
    lock().len()
}

/// Holds the cache lock for a batch of lookups.
///
/// Staging resolves one color per point; taking the lock once per batch keeps
/// that loop free of lock traffic.
pub fn resolver() -> Resolver {
    Resolver { cache: lock() }
}

pub struct Resolver {
    cache: MutexGuard<'static, Cache>,
}

impl Resolver {
    pub fn resolve(&mut self, css: &str) -> [f32; 3] {
        if let Some(rgb) = self.cache.get(css) {
            return *rgb;
        }
        let rgb = parse_css_color(css).unwrap_or_else(|| {
            log::debug!("unparsable color {css:?}; using white");
            FALLBACK
        });
        self.cache.insert(css.to_owned(), rgb);
        rgb
    }
}

/// Parses `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb[a]()`, `hsl[a]()` and
/// CSS named colors. Returns `None` for anything else.
pub fn parse_css_color(input: &str) -> Option<[f32; 3]> {
    let s = input.trim().to_ascii_lowercase();
    if s.is_empty() {
        return None;
    }

    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(args) = function_args(&s, "rgba").or_else(|| function_args(&s, "rgb")) {
        return parse_rgb_args(&args);
    }
    if let Some(args) = function_args(&s, "hsla").or_else(|| function_args(&s, "hsl")) {
        return parse_hsl_args(&args);
    }

    named_color(&s).map(|[r, g, b]| [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0])
}

fn parse_hex(hex: &str) -> Option<[f32; 3]> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    let [r, g, b] = match hex.len() {
        3 | 4 => [nibble(0)?, nibble(1)?, nibble(2)?],
        6 | 8 => [byte(0)?, byte(2)?, byte(4)?],
        _ => return None,
    };
    Some([r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0])
}

/// Splits `name(a, b, c)` / `name(a b c / d)` into its arguments.
fn function_args<'a>(s: &'a str, name: &str) -> Option<Vec<&'a str>> {
    let inner = s.strip_prefix(name)?.trim_start().strip_prefix('(')?.strip_suffix(')')?;
    let args: Vec<&str> = inner
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|a| !a.is_empty())
        .collect();
    (3..=4).contains(&args.len()).then_some(args)
}

fn parse_rgb_args(args: &[&str]) -> Option<[f32; 3]> {
    let channel = |a: &str| -> Option<f32> {
        let v = match a.strip_suffix('%') {
            Some(p) => p.parse::<f32>().ok()? / 100.0,
            None => a.parse::<f32>().ok()? / 255.0,
        };
        v.is_finite().then(|| v.clamp(0.0, 1.0))
    };
    Some([channel(args[0])?, channel(args[1])?, channel(args[2])?])
}

fn parse_hsl_args(args: &[&str]) -> Option<[f32; 3]> {
    let hue = {
        let a = args[0];
        let (num, unit_to_deg) = if let Some(v) = a.strip_suffix("deg") {
            (v, 1.0)
        } else if let Some(v) = a.strip_suffix("turn") {
            (v, 360.0)
        } else if let Some(v) = a.strip_suffix("rad") {
            (v, 180.0 / std::f32::consts::PI)
        } else {
            (a, 1.0)
        };
        num.parse::<f32>().ok()? * unit_to_deg
    };
    let percent = |a: &str| -> Option<f32> {
        let v = a.strip_suffix('%').unwrap_or(a).parse::<f32>().ok()? / 100.0;
        v.is_finite().then(|| v.clamp(0.0, 1.0))
    };
    let s = percent(args[1])?;
    let l = percent(args[2])?;
    if !hue.is_finite() {
        return None;
    }
    Some(hsl_to_rgb(hue.rem_euclid(360.0), s, l))
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [f32; 3] {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = h / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    [r + m, g + m, b + m]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: [f32; 3], b: [f32; 3]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-3)
    }

    #[test]
    fn hex_forms() {
        assert_eq!(parse_css_color("#fff"), Some([1.0, 1.0, 1.0]));
        assert_eq!(parse_css_color("#FF0000"), Some([1.0, 0.0, 0.0]));
        assert_eq!(parse_css_color("#00ff0080"), Some([0.0, 1.0, 0.0]));
        assert!(approx(parse_css_color("#1234").unwrap(), [17.0 / 255.0, 34.0 / 255.0, 51.0 / 255.0]));
        assert_eq!(parse_css_color("#12345"), None);
        assert_eq!(parse_css_color("#ggg"), None);
    }

    #[test]
    fn rgb_functions() {
        assert!(approx(parse_css_color("rgb(255, 128, 0)").unwrap(), [1.0, 128.0 / 255.0, 0.0]));
        assert!(approx(parse_css_color("rgba(0,0,255,0.5)").unwrap(), [0.0, 0.0, 1.0]));
        assert!(approx(parse_css_color("rgb(100% 50% 0% / 20%)").unwrap(), [1.0, 0.5, 0.0]));
        assert_eq!(parse_css_color("rgb(1, 2)"), None);
    }

    #[test]
    fn hsl_functions() {
        assert!(approx(parse_css_color("hsl(0, 100%, 50%)").unwrap(), [1.0, 0.0, 0.0]));
        assert!(approx(parse_css_color("hsl(120deg 100% 25%)").unwrap(), [0.0, 0.5, 0.0]));
        assert!(approx(parse_css_color("hsla(0.5turn, 100%, 50%, 1)").unwrap(), [0.0, 1.0, 1.0]));
    }

    #[test]
    fn named_colors() {
        assert_eq!(parse_css_color("Red"), Some([1.0, 0.0, 0.0]));
        assert!(approx(parse_css_color("rebeccapurple").unwrap(), [0.4, 0.2, 0.6]));
        assert_eq!(parse_css_color("not-a-color"), None);
    }

    #[test]
    fn unparsable_resolves_to_white_and_is_memoized() {
        let key = "definitely not a color (resolve test)";
        assert_eq!(resolve_color("  #000000 "), [0.0, 0.0, 0.0]);

        let mut r = resolver();
        assert_eq!(r.resolve(key), [1.0, 1.0, 1.0]);
        assert!(r.cache.contains_key(key));
        assert_eq!(r.resolve(key), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn clear_cache_forgets_entries() {
        let key = "#abcdef /* clear test */";
        resolver().resolve(key);
        clear_cache();
        assert!(!resolver().cache.contains_key(key));
    }
}
