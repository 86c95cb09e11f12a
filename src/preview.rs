//! Comparison sheet assembly
//!
//! Image processing lives outside this crate. A [`Renderer`] applies a
//! parameter vector to the reference image, and a [`SheetComposer`] lays
//! rendered cells out on a printable sheet. [`compose_round_sheet`] wires
//! the two together for one round.

use crate::session::Round;
use crate::space::ParameterVector;

/// Cells on a comparison sheet (2×2)
pub const SHEET_CELLS: usize = 4;

/// Label of an empty cell
pub const BLANK_LABEL: &str = "-";

/// Applies correction parameters to a reference image
///
/// Implementations must be deterministic for a given image and vector.
pub trait Renderer {
    /// Rendered image type
    type Image;

    /// Render a preview of `reference` with `params` applied
    fn render(&self, reference: &str, params: &ParameterVector) -> Self::Image;

    /// Image for an unused sheet cell
    fn blank(&self) -> Self::Image;
}

/// One labeled cell of a sheet
#[derive(Clone, Debug, PartialEq)]
pub struct SheetCell<I> {
    /// Slot label, or [`BLANK_LABEL`]
    pub label: String,
    /// Parameters rendered in the cell; `None` for blanks
    pub params: Option<ParameterVector>,
    /// Rendered image
    pub image: I,
}

impl<I> SheetCell<I> {
    /// Whether the cell is padding
    pub fn is_blank(&self) -> bool {
        self.params.is_none()
    }
}

/// Arranges rendered cells into a single sheet
pub trait SheetComposer<I> {
    /// Sheet type
    type Sheet;

    /// Lay out cells in reading order
    fn lay_out(&self, cells: Vec<SheetCell<I>>) -> Self::Sheet;
}

/// Render every candidate of `round` and compose the sheet
///
/// Rounds with fewer than [`SHEET_CELLS`] candidates are padded with blank
/// cells so the layout is always 2×2.
pub fn compose_round_sheet<R, C>(
    renderer: &R,
    composer: &C,
    reference: &str,
    round: &Round,
) -> C::Sheet
where
    R: Renderer,
    C: SheetComposer<R::Image>,
{
    let mut cells: Vec<SheetCell<R::Image>> = round
        .candidates
        .iter()
        .map(|c| SheetCell {
            label: c.slot.clone(),
            params: Some(c.vector),
            image: renderer.render(reference, &c.vector),
        })
        .collect();
    while cells.len() < SHEET_CELLS {
        cells.push(SheetCell {
            label: BLANK_LABEL.to_string(),
            params: None,
            image: renderer.blank(),
        });
    }
    tracing::debug!(
        round_index = round.round_index,
        candidates = round.candidates.len(),
        "comparison sheet composed"
    );
    composer.lay_out(cells)
}
