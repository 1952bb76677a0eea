//! HTML documents handed to the browser on the JSX path.

use crate::icons::icon_shim_script;

/// Default CSS utility framework script.
pub const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";

/// Lucide UMD bundle some HTML widgets load for their icons.
pub const LUCIDE_CDN: &str = "https://cdn.jsdelivr.net/npm/lucide@0.292.0/dist/umd/lucide.min.js";

const RESET_CSS: &str = r#"html,body,#root { margin: 0; padding: 0; background: transparent; }
    body { overflow: hidden; }
    .widget { display: inline-block; }"#;

fn tailwind_tags(cdn: Option<&str>) -> String {
    match cdn {
        // preflight off: widgets bring their own resets and the page must stay transparent
        Some(src) => format!(
            "<script>window.tailwind=window.tailwind||{{}};window.tailwind.config={{corePlugins:{{preflight:false}}}};</script>\n  <script src=\"{}\"></script>",
            src
        ),
        None => String::new(),
    }
}

/// Full document seeding `#root` with server-rendered markup.
///
/// The browser bundle is not referenced here; the driver injects it as an
/// inline script once the document has loaded.
pub fn jsx_document(markup: &str, tailwind_cdn: Option<&str>) -> String {
    format!(
        r#"<!doctype html>
<html>
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <style>
    {reset}
  </style>
  {tailwind}
  <script>{shim}</script>
  <title>widgetshot</title>
</head>
<body>
  <div id="root">{markup}</div>
</body>
</html>"#,
        reset = RESET_CSS,
        tailwind = tailwind_tags(tailwind_cdn),
        shim = icon_shim_script(),
        markup = markup,
    )
}

/// Empty document that pulls the CDN scripts into the browser cache.
pub fn warm_up_document(tailwind_cdn: Option<&str>, with_lucide: bool) -> String {
    let lucide = if with_lucide {
        format!("<script src=\"{}\"></script>", LUCIDE_CDN)
    } else {
        String::new()
    };
    format!(
        "<!doctype html><html><head>\n  {}\n  {}\n</head><body></body></html>",
        tailwind_tags(tailwind_cdn),
        lucide
    )
}
