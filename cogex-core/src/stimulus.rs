use serde::{Deserialize, Serialize};

use crate::expr::Expr;

/// Defines stimuli and the markup they render to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum StimulusTemplate {
    Blank,
    Text {
        text: Expr,
        #[serde(default = "default_color")]
        color: Expr,
    },
    /// `shape` is one of square, circle, triangle.
    Symbol {
        shape: Expr,
        #[serde(default = "default_color")]
        color: Expr,
    },
    /// Target arrow surrounded by `flankers` distractor arrows on each side.
    /// Directions accept left/right and l/r in either case.
    Flanker {
        direction: Expr,
        distractor: Expr,
        #[serde(default = "default_flankers")]
        flankers: usize,
        #[serde(default = "default_color")]
        color: Expr,
    },
    Html {
        html: Expr,
    },
}

fn default_color() -> Expr {
    Expr::lit("white")
}

fn default_flankers() -> usize {
    2
}

impl StimulusTemplate {
    pub fn text(text: impl Into<Expr>, color: impl Into<Expr>) -> Self {
        StimulusTemplate::Text {
            text: text.into(),
            color: color.into(),
        }
    }

    pub fn symbol(shape: impl Into<Expr>, color: impl Into<Expr>) -> Self {
        StimulusTemplate::Symbol {
            shape: shape.into(),
            color: color.into(),
        }
    }

    pub fn flanker(direction: impl Into<Expr>, distractor: impl Into<Expr>, flankers: usize) -> Self {
        StimulusTemplate::Flanker {
            direction: direction.into(),
            distractor: distractor.into(),
            flankers,
            color: default_color(),
        }
    }

    /// The HTML shown on screen, as a derivation over the template parts.
    pub fn markup(&self) -> Expr {
        match self {
            StimulusTemplate::Blank => Expr::lit(""),
            StimulusTemplate::Text { text, color } => Expr::concat([
                Expr::lit("<div style='color:"),
                color.clone(),
                Expr::lit("'>"),
                text.clone(),
                Expr::lit("</div>"),
            ]),
            StimulusTemplate::Symbol { shape, color } => Expr::concat([
                Expr::lit("<div style='"),
                Expr::lookup(
                    shape.clone(),
                    [
                        ("square", "width:120px;height:120px;"),
                        ("circle", "width:120px;height:120px;border-radius:50%;"),
                        (
                            "triangle",
                            "width:120px;height:104px;clip-path:polygon(50% 0,100% 100%,0 100%);",
                        ),
                    ],
                ),
                Expr::lit("margin:auto;background-color:"),
                color.clone(),
                Expr::lit("'></div>"),
            ]),
            StimulusTemplate::Flanker {
                direction,
                distractor,
                flankers,
                color,
            } => Expr::concat([
                Expr::lit("<div style='color:"),
                color.clone(),
                Expr::lit("'>"),
                Expr::repeat(arrow(distractor), *flankers),
                arrow(direction),
                Expr::repeat(arrow(distractor), *flankers),
                Expr::lit("</div>"),
            ]),
            StimulusTemplate::Html { html } => html.clone(),
        }
    }

    /// Named template parameters, echoed alongside the rendered markup.
    pub fn parts(&self) -> Vec<(&'static str, &Expr)> {
        match self {
            StimulusTemplate::Blank => Vec::new(),
            StimulusTemplate::Text { text, color } => vec![("text", text), ("color", color)],
            StimulusTemplate::Symbol { shape, color } => vec![("shape", shape), ("color", color)],
            StimulusTemplate::Flanker {
                direction,
                distractor,
                color,
                ..
            } => vec![
                ("direction", direction),
                ("distractor", distractor),
                ("color", color),
            ],
            StimulusTemplate::Html { .. } => Vec::new(),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, StimulusTemplate::Blank)
    }
}

fn arrow(direction: &Expr) -> Expr {
    Expr::lookup(
        direction.clone(),
        [
            ("left", "&lt;"),
            ("l", "&lt;"),
            ("L", "&lt;"),
            ("LEFT", "&lt;"),
            ("right", "&gt;"),
            ("r", "&gt;"),
            ("R", "&gt;"),
            ("RIGHT", "&gt;"),
        ],
    )
}
