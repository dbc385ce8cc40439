use crate::Result;

/// Walks the scope root and its descendants, skipping non-visual tags, and
/// returns computed style plus geometry for at most `limit` elements.
const EXTRACTION_SCRIPT: &str = r#"((scopeSelector, limit) => {
  const SKIP = new Set(['SCRIPT', 'STYLE', 'META', 'TITLE', 'HEAD', 'LINK', 'NOSCRIPT', 'TEMPLATE']);
  const base = { url: location.href, title: document.title, total: 0, nodes: [] };
  let root = document.documentElement;
  if (scopeSelector !== null) {
    try {
      root = document.querySelector(scopeSelector);
    } catch (e) {
      return Object.assign(base, { status: 'invalid_selector', message: String(e) });
    }
    if (!root) {
      return Object.assign(base, { status: 'selector_not_found' });
    }
  }

  const num = (v, fallback) => {
    const n = parseFloat(v);
    return Number.isFinite(n) ? n : fallback;
  };
  const sides = (cs, prop) => ({
    top: num(cs[prop + 'Top'], 0),
    right: num(cs[prop + 'Right'], 0),
    bottom: num(cs[prop + 'Bottom'], 0),
    left: num(cs[prop + 'Left'], 0),
  });

  const all = [root, ...root.querySelectorAll('*')].filter((el) => !SKIP.has(el.tagName));
  const nodes = [];
  for (const el of all.slice(0, limit)) {
    const cs = window.getComputedStyle(el);
    const r = el.getBoundingClientRect();
    const display = cs.display;
    const style = {
      fontFamily: cs.fontFamily,
      fontSize: num(cs.fontSize, 0),
      fontWeight: cs.fontWeight,
      lineHeight: cs.lineHeight,
      letterSpacing: cs.letterSpacing,
      textAlign: cs.textAlign,
      color: cs.color,
      backgroundColor: cs.backgroundColor,
      borderColor: cs.borderTopColor,
      borderRadius: num(cs.borderTopLeftRadius, 0),
      borderWidth: num(cs.borderTopWidth, 0),
      borderStyle: cs.borderTopStyle,
      margin: sides(cs, 'margin'),
      padding: sides(cs, 'padding'),
      boxShadow: cs.boxShadow,
      opacity: num(cs.opacity, 1),
      transform: cs.transform,
      display,
      position: cs.position,
    };
    if (display === 'flex' || display === 'inline-flex') {
      style.flex = {
        direction: cs.flexDirection,
        wrap: cs.flexWrap,
        justifyContent: cs.justifyContent,
        alignItems: cs.alignItems,
        gap: cs.gap,
      };
    }
    if (display === 'grid' || display === 'inline-grid') {
      style.grid = {
        templateColumns: cs.gridTemplateColumns,
        templateRows: cs.gridTemplateRows,
        gap: cs.gap,
      };
    }
    nodes.push({
      tag: el.tagName.toLowerCase(),
      id: el.id || null,
      classes: Array.from(el.classList),
      text: (el.innerText || el.textContent || '').trim().slice(0, 500),
      rect: { x: r.x + window.scrollX, y: r.y + window.scrollY, width: r.width, height: r.height },
      style,
    });
  }
  return Object.assign(base, { status: 'ok', total: all.length, nodes });
})"#;

/// The extraction expression with its arguments applied.
pub(crate) fn extraction_script(selector: Option<&str>, limit: usize) -> Result<String> {
    let selector = serde_json::to_string(&selector)?;
    Ok(format!("{EXTRACTION_SCRIPT}({selector}, {limit})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_is_json_escaped() {
        let script = extraction_script(Some(r#"a[href="/x"]"#), 50).expect("script");
        assert!(script.ends_with(r#"("a[href=\"/x\"]", 50)"#), "{script}");
    }

    #[test]
    fn missing_selector_becomes_null() {
        let script = extraction_script(None, 100).expect("script");
        assert!(script.ends_with("(null, 100)"));
    }
}
