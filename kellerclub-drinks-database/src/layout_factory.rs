use std::collections::BTreeMap;

use tracing::warn;

use crate::models::{Button, Layout, GRID_SIZE};

/// A button row as stored: layout name, position and what the button does.
#[derive(Debug, Clone)]
pub struct ButtonRow {
    pub layout_name: String,
    pub xpos: i32,
    pub ypos: i32,
    pub button: Button,
}

/// Builds layouts from the known layout names and their button rows.
///
/// Layouts without any buttons are still returned. Rows pointing outside the
/// grid are skipped.
#[must_use]
pub fn from_button_rows(
    layout_names: impl IntoIterator<Item = String>,
    rows: impl IntoIterator<Item = ButtonRow>,
) -> BTreeMap<String, Layout> {
    let mut layouts: BTreeMap<String, Layout> = layout_names
        .into_iter()
        .map(|name| (name.clone(), Layout::empty(name)))
        .collect();

    for row in rows {
        let Some((xpos, ypos)) = grid_position(row.xpos, row.ypos) else {
            warn!(
                layout = %row.layout_name,
                xpos = row.xpos,
                ypos = row.ypos,
                "ignoring button outside of the grid"
            );
            continue;
        };
        let layout = layouts
            .entry(row.layout_name.clone())
            .or_insert_with(|| Layout::empty(row.layout_name));
        layout.grid[xpos][ypos] = Some(row.button);
    }

    layouts
}

fn grid_position(xpos: i32, ypos: i32) -> Option<(usize, usize)> {
    let xpos = usize::try_from(xpos).ok().filter(|xpos| *xpos < GRID_SIZE)?;
    let ypos = usize::try_from(ypos).ok().filter(|ypos| *ypos < GRID_SIZE)?;
    Some((xpos, ypos))
}

#[cfg(test)]
mod tests {
    use super::{from_button_rows, ButtonRow};
    use crate::models::Button;

    fn order(layout_name: &str, xpos: i32, ypos: i32, drink_name: &str) -> ButtonRow {
        ButtonRow {
            layout_name: layout_name.to_owned(),
            xpos,
            ypos,
            button: Button::Order {
                display_name: drink_name.to_uppercase(),
                drink_name: drink_name.to_owned(),
            },
        }
    }

    #[test]
    fn buttons_land_in_their_cells() {
        let layouts = from_button_rows(
            ["default".to_owned()],
            [
                order("default", 0, 0, "bier"),
                order("default", 4, 3, "mate"),
                ButtonRow {
                    layout_name: "shots".to_owned(),
                    xpos: 2,
                    ypos: 2,
                    button: Button::Link {
                        display_name: "Zurück".to_owned(),
                        target_layout: "default".to_owned(),
                    },
                },
            ],
        );

        assert_eq!(layouts.len(), 2);
        let default = &layouts["default"];
        assert_eq!(default.button(0, 0).map(Button::display_name), Some("BIER"));
        assert_eq!(default.button(4, 3).map(Button::display_name), Some("MATE"));
        assert_eq!(default.buttons().count(), 2);
        assert!(matches!(
            layouts["shots"].button(2, 2),
            Some(Button::Link { target_layout, .. }) if target_layout == "default"
        ));
    }

    #[test]
    fn empty_layouts_are_kept() {
        let layouts = from_button_rows(["default".to_owned()], []);

        assert_eq!(layouts["default"].buttons().count(), 0);
    }

    #[test]
    fn out_of_grid_rows_are_skipped() {
        let layouts = from_button_rows(
            Vec::new(),
            [order("default", 5, 0, "bier"), order("default", 0, -1, "mate")],
        );

        assert!(layouts.is_empty());
    }
}
