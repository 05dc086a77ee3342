//! Sandboxed Preview Renderer.
//!
//! Markup is handed to an `<iframe sandbox srcdoc>` whose capabilities come
//! from an explicit allow-list ([`SandboxPolicy`]). The default grants scripts
//! and nothing else: no same-origin access (so no host cookies or storage), no
//! top-level navigation, no popups.
//!
//! The host never parses, validates or sanitizes the markup. It is only
//! attribute-escaped so it lands verbatim inside `srcdoc`. Broken HTML renders
//! broken inside the frame; [`PreviewRenderer::render`] cannot fail.
//!
//! Every render produces a new [`PreviewFrame`] with a fresh generation number.
//! Front-ends replace the whole frame on each generation instead of patching
//! it, so globals and listeners from an earlier version never survive.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One token of the iframe `sandbox` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SandboxCapability {
    Scripts,
    SameOrigin,
    TopNavigation,
    Popups,
    Forms,
    Modals,
    Downloads,
    PointerLock,
}

impl SandboxCapability {
    pub fn token(&self) -> &'static str {
        match self {
            Self::Scripts => "allow-scripts",
            Self::SameOrigin => "allow-same-origin",
            Self::TopNavigation => "allow-top-navigation",
            Self::Popups => "allow-popups",
            Self::Forms => "allow-forms",
            Self::Modals => "allow-modals",
            Self::Downloads => "allow-downloads",
            Self::PointerLock => "allow-pointer-lock",
        }
    }

    pub const ALL: [SandboxCapability; 8] = [
        Self::Scripts,
        Self::SameOrigin,
        Self::TopNavigation,
        Self::Popups,
        Self::Forms,
        Self::Modals,
        Self::Downloads,
        Self::PointerLock,
    ];
}

impl FromStr for SandboxCapability {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        let wanted = if wanted.starts_with("allow-") {
            wanted
        } else {
            format!("allow-{wanted}")
        };
        Self::ALL
            .iter()
            .copied()
            .find(|cap| cap.token() == wanted)
            .ok_or_else(|| PolicyError::UnknownToken(s.trim().to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    UnknownToken(String),
    /// `allow-scripts` + `allow-same-origin` lets the frame remove its own sandbox.
    EscapableCombination,
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownToken(t) => write!(f, "unknown sandbox capability '{t}'"),
            Self::EscapableCombination => write!(
                f,
                "allow-scripts together with allow-same-origin would let previews escape the sandbox"
            ),
        }
    }
}

impl std::error::Error for PolicyError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPolicy {
    granted: BTreeSet<SandboxCapability>,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        let mut granted = BTreeSet::new();
        granted.insert(SandboxCapability::Scripts);
        Self { granted }
    }
}

impl SandboxPolicy {
    /// Deny everything, scripts included.
    pub fn locked() -> Self {
        Self {
            granted: BTreeSet::new(),
        }
    }

    /// Grant one more capability. Checked with [`SandboxPolicy::validate`].
    pub fn allow(mut self, cap: SandboxCapability) -> Self {
        self.granted.insert(cap);
        self
    }

    /// Default policy plus extra tokens, e.g. from settings.
    pub fn with_tokens<I, S>(tokens: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut policy = Self::default();
        for token in tokens {
            policy = policy.allow(token.as_ref().parse()?);
        }
        policy.validate()?;
        Ok(policy)
    }

    pub fn allows(&self, cap: SandboxCapability) -> bool {
        self.granted.contains(&cap)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.allows(SandboxCapability::Scripts) && self.allows(SandboxCapability::SameOrigin) {
            return Err(PolicyError::EscapableCombination);
        }
        Ok(())
    }

    /// Value of the `sandbox` attribute. Empty string = everything denied.
    pub fn attribute(&self) -> String {
        self.granted
            .iter()
            .map(|cap| cap.token())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One fully isolated rendering of a snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewFrame {
    generation: u64,
    sandbox: String,
    srcdoc: String,
    source_len: usize,
}

impl PreviewFrame {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn sandbox_attribute(&self) -> &str {
        &self.sandbox
    }

    /// Attribute-escaped markup as it appears in `srcdoc`.
    pub fn srcdoc(&self) -> &str {
        &self.srcdoc
    }

    /// Length in bytes of the markup this frame was rendered from.
    pub fn source_len(&self) -> usize {
        self.source_len
    }

    /// The `<iframe>` element embedding the snippet.
    pub fn iframe_html(&self) -> String {
        format!(
            "<iframe title=\"preview\" data-generation=\"{}\" sandbox=\"{}\" referrerpolicy=\"no-referrer\" srcdoc=\"{}\"></iframe>",
            self.generation, self.sandbox, self.srcdoc
        )
    }

    /// A standalone page hosting the sandboxed frame.
    pub fn host_document(&self, title: &str) -> String {
        let title = escape_attribute(title);
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>html,body{{margin:0;height:100%}}iframe{{border:0;width:100%;height:100%}}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
            self.iframe_html()
        )
    }
}

/// Stateless with respect to content: each call to `render` starts over.
#[derive(Debug, Clone, Default)]
pub struct PreviewRenderer {
    policy: SandboxPolicy,
    generation: u64,
}

impl PreviewRenderer {
    pub fn new(policy: SandboxPolicy) -> Self {
        Self {
            policy,
            generation: 0,
        }
    }

    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    pub fn render(&mut self, markup: &str) -> PreviewFrame {
        self.generation += 1;
        PreviewFrame {
            generation: self.generation,
            sandbox: self.policy.attribute(),
            srcdoc: escape_attribute(markup),
            source_len: markup.len(),
        }
    }
}

/// Escape for a double-quoted HTML attribute value.
pub fn escape_attribute(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + raw.len() / 8);
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_allows_only_scripts() {
        let policy = SandboxPolicy::default();
        assert_eq!(policy.attribute(), "allow-scripts");
        assert!(!policy.allows(SandboxCapability::SameOrigin));
        assert!(!policy.allows(SandboxCapability::TopNavigation));
        assert!(!policy.allows(SandboxCapability::Popups));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_scripts_plus_same_origin_rejected() {
        let policy = SandboxPolicy::default().allow(SandboxCapability::SameOrigin);
        assert_eq!(policy.validate(), Err(PolicyError::EscapableCombination));
        assert!(SandboxPolicy::with_tokens(["same-origin"]).is_err());
    }

    #[test]
    fn test_tokens_parse_with_or_without_prefix() {
        let policy = SandboxPolicy::with_tokens(["forms", "allow-modals"]).unwrap();
        assert_eq!(policy.attribute(), "allow-scripts allow-forms allow-modals");
        assert!(matches!(
            SandboxPolicy::with_tokens(["allow-everything"]),
            Err(PolicyError::UnknownToken(_))
        ));
    }

    #[test]
    fn test_locked_policy_has_empty_attribute() {
        let mut renderer = PreviewRenderer::new(SandboxPolicy::locked());
        let frame = renderer.render("<p>x</p>");
        assert!(frame.iframe_html().contains("sandbox=\"\""));
    }

    #[test]
    fn test_each_render_is_a_new_generation() {
        let mut renderer = PreviewRenderer::default();
        let a = renderer.render("<p>same</p>");
        let b = renderer.render("<p>same</p>");
        assert!(b.generation() > a.generation());
        assert_eq!(a.srcdoc(), b.srcdoc());
    }

    #[test]
    fn test_markup_cannot_break_out_of_srcdoc() {
        let mut renderer = PreviewRenderer::default();
        let hostile = "\"></iframe><script>parent.document.cookie</script>";
        let html = renderer.render(hostile).iframe_html();
        assert!(!html.contains("\"></iframe><script>"));
        assert_eq!(html.matches("</iframe>").count(), 1);
        assert!(html.contains("&quot;&gt;&lt;/iframe&gt;&lt;script&gt;"));
    }

    #[test]
    fn test_malformed_markup_renders_without_error() {
        let mut renderer = PreviewRenderer::default();
        let frame = renderer.render("<div><span>unclosed <b");
        assert_eq!(frame.source_len(), "<div><span>unclosed <b".len());
    }

    #[test]
    fn test_host_document_wraps_single_iframe() {
        let mut renderer = PreviewRenderer::default();
        let doc = renderer.render("<h1>Hi</h1>").host_document("Demo <1>");
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<title>Demo &lt;1&gt;</title>"));
        assert_eq!(doc.matches("<iframe").count(), 1);
    }
}
