//! Body-part picker: part, then side (when the part has sides), then view.
//!
//! The resolved selection names a reference image by the
//! `{part}/{side-}{view}.jpg` convention.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Front,
    Back,
    Side,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            View::Front => "front",
            View::Back => "back",
            View::Side => "side",
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BodyPart {
    pub id: &'static str,
    pub label: &'static str,
    /// Empty when the part is not lateral.
    #[schema(value_type = Vec<Side>)]
    pub sides: &'static [Side],
    #[schema(value_type = Vec<View>)]
    pub views: &'static [View],
    pub available: bool,
}

impl BodyPart {
    pub fn has_sides(&self) -> bool {
        !self.sides.is_empty()
    }
}

const LR: &[Side] = &[Side::Left, Side::Right];
const FB: &[View] = &[View::Front, View::Back];
const FBS: &[View] = &[View::Front, View::Back, View::Side];

static CATALOG: &[BodyPart] = &[
    BodyPart { id: "head", label: "Head", sides: &[], views: FBS, available: true },
    BodyPart { id: "neck", label: "Neck", sides: &[], views: FB, available: true },
    BodyPart { id: "shoulder", label: "Shoulder", sides: LR, views: FB, available: true },
    BodyPart { id: "elbow", label: "Elbow", sides: LR, views: FB, available: true },
    BodyPart { id: "wrist", label: "Wrist & Hand", sides: LR, views: FB, available: true },
    BodyPart { id: "back", label: "Back", sides: &[], views: &[View::Back], available: true },
    BodyPart { id: "hip", label: "Hip", sides: LR, views: FBS, available: true },
    BodyPart { id: "knee", label: "Knee", sides: LR, views: FBS, available: true },
    BodyPart { id: "ankle", label: "Ankle & Foot", sides: LR, views: FBS, available: true },
    BodyPart { id: "chest", label: "Chest", sides: &[], views: &[View::Front], available: false },
    BodyPart { id: "abdomen", label: "Abdomen", sides: &[], views: &[View::Front], available: false },
];

pub fn catalog() -> &'static [BodyPart] {
    CATALOG
}

pub fn find_part(id: &str) -> Option<&'static BodyPart> {
    CATALOG.iter().find(|p| p.id == id)
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    #[error("unknown body part '{0}'")]
    UnknownPart(String),
    #[error("body part '{0}' is not available yet")]
    Unavailable(&'static str),
    #[error("'{part}' requires a side")]
    SideRequired { part: &'static str },
    #[error("'{part}' has no sides")]
    NoSides { part: &'static str },
    #[error("'{view}' view is not offered for '{part}'")]
    UnsupportedView { part: &'static str, view: &'static str },
    #[error("{0} is not expected at this step")]
    OutOfOrder(&'static str),
}

/// A fully resolved choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub part: &'static BodyPart,
    pub side: Option<Side>,
    pub view: View,
}

impl PartialEq for BodyPart {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BodyPart {}

impl Selection {
    pub fn image_path(&self) -> String {
        match self.side {
            Some(side) => format!("{}/{}-{}.jpg", self.part.id, side.as_str(), self.view.as_str()),
            None => format!("{}/{}.jpg", self.part.id, self.view.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Part,
    Side,
    View,
    Done,
}

/// Advances one field at a time; `back` undoes the latest choice.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    part: Option<&'static BodyPart>,
    side: Option<Side>,
    view: Option<View>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> Step {
        match (self.part, self.side, self.view) {
            (None, _, _) => Step::Part,
            (Some(_), _, Some(_)) => Step::Done,
            (Some(p), None, None) if p.has_sides() => Step::Side,
            (Some(_), _, None) => Step::View,
        }
    }

    pub fn choose_part(&mut self, id: &str) -> Result<Step, SelectError> {
        if self.step() != Step::Part {
            return Err(SelectError::OutOfOrder("part"));
        }
        let part = find_part(id).ok_or_else(|| SelectError::UnknownPart(id.to_string()))?;
        if !part.available {
            return Err(SelectError::Unavailable(part.id));
        }
        self.part = Some(part);
        Ok(self.step())
    }

    pub fn choose_side(&mut self, side: Side) -> Result<Step, SelectError> {
        match self.part {
            Some(p) if !p.has_sides() => Err(SelectError::NoSides { part: p.id }),
            Some(p) if self.step() == Step::Side && p.sides.contains(&side) => {
                self.side = Some(side);
                Ok(self.step())
            }
            _ => Err(SelectError::OutOfOrder("side")),
        }
    }

    /// Completes the selection.
    pub fn choose_view(&mut self, view: View) -> Result<Selection, SelectError> {
        let part = match self.part {
            Some(p) if self.step() == Step::View => p,
            Some(p) if self.step() == Step::Side => return Err(SelectError::SideRequired { part: p.id }),
            _ => return Err(SelectError::OutOfOrder("view")),
        };
        if !part.views.contains(&view) {
            return Err(SelectError::UnsupportedView { part: part.id, view: view.as_str() });
        }
        self.view = Some(view);
        Ok(Selection { part, side: self.side, view })
    }

    pub fn back(&mut self) {
        if self.view.take().is_some() {
            return;
        }
        if self.side.take().is_some() {
            return;
        }
        self.part = None;
    }
}

/// One-shot resolution of a complete `(part, side, view)` triple.
pub fn resolve(part: &str, side: Option<Side>, view: View) -> Result<Selection, SelectError> {
    let mut sel = Selector::new();
    sel.choose_part(part)?;
    match (sel.step(), side) {
        (Step::Side, Some(s)) => {
            sel.choose_side(s)?;
        }
        (Step::Side, None) => {
            let p = sel.part.map(|p| p.id).unwrap_or_default();
            return Err(SelectError::SideRequired { part: p });
        }
        (_, Some(_)) => {
            let p = sel.part.map(|p| p.id).unwrap_or_default();
            return Err(SelectError::NoSides { part: p });
        }
        _ => {}
    }
    sel.choose_view(view)
}
