//! Global placeholder components for icon names.
//!
//! Widgets frequently reference icon components (`<Star />`, `<Heart />`)
//! without importing them, expecting a CDN icon library to have put them on
//! `window`. The shim defines each allow-listed name as a component that draws
//! a small translucent box, so neither SSR nor hydration throws a
//! `ReferenceError`. Names already defined are left untouched.

/// Icon components made available globally.
pub const ICON_NAMES: &[&str] = &[
    "Activity", "AlertCircle", "AlertTriangle", "ArrowDown", "ArrowLeft", "ArrowRight", "ArrowUp",
    "Bell", "Bookmark", "Calendar", "Camera", "Check", "CheckCircle", "ChevronDown", "ChevronLeft",
    "ChevronRight", "ChevronUp", "Circle", "Clock", "Cloud", "CloudRain", "CloudSun", "Copy",
    "CreditCard", "Download", "Droplet", "Edit", "ExternalLink", "Eye", "File", "FileText",
    "Filter", "Flag", "Folder", "Gift", "Globe", "Grid", "Heart", "Home", "Image", "Info",
    "Link", "List", "Lock", "Mail", "MapPin", "Menu", "MessageCircle", "Mic", "Minus", "Moon",
    "MoreHorizontal", "MoreVertical", "Music", "Pause", "Phone", "Play", "Plus", "RefreshCw",
    "Search", "Send", "Settings", "Share", "ShoppingCart", "SkipBack", "SkipForward", "Star",
    "Sun", "Tag", "ThumbsUp", "Trash", "TrendingDown", "TrendingUp", "Upload", "User", "Users",
    "Volume2", "Wifi", "Wind", "X", "Zap",
];

/// JavaScript that installs the placeholders on `window` (or `globalThis` under node).
///
/// Components render through the global `React`, which the SSR runner and the
/// hydration entry both expose before the widget runs.
pub fn icon_shim_script() -> String {
    let names = serde_json::to_string(ICON_NAMES).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"(function(g){{
  var names = {names};
  names.forEach(function(n){{
    if (typeof g[n] !== 'undefined') return;
    g[n] = function(props){{
      var R = g.React;
      if (!R) return null;
      var size = (props && props.size) || 24;
      return R.createElement('span', {{
        'data-icon': n,
        className: props && props.className,
        style: {{ display: 'inline-block', width: size, height: size, borderRadius: 4, background: 'currentColor', opacity: 0.25 }}
      }});
    }};
  }});
}})(typeof window !== 'undefined' ? window : globalThis);"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shim_lists_every_icon() {
        let js = icon_shim_script();
        for name in ICON_NAMES {
            assert!(js.contains(&format!("\"{}\"", name)), "missing {}", name);
        }
        assert!(js.contains("typeof g[n] !== 'undefined'"));
    }

    #[test]
    fn names_are_unique_component_identifiers() {
        let mut seen = std::collections::HashSet::new();
        for name in ICON_NAMES {
            assert!(name.chars().next().is_some_and(|c| c.is_ascii_uppercase()));
            assert!(seen.insert(*name), "duplicate {}", name);
        }
    }
}
