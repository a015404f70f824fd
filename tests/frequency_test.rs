use crossterm::event::{KeyCode, KeyModifiers};
use sheetstack::config::{AppConfig, DisplayConfig};
use sheetstack::frequency::frequency_sheet;
use sheetstack::Sheet;

mod common;
use common::*;

fn colors() -> Sheet {
    fields_sheet(
        "paint",
        &["id", "color"],
        &[
            &["1", "red"],
            &["2", "blue"],
            &["3", "red"],
            &["4", "green"],
            &["5", "red"],
            &["6", "blue"],
        ],
    )
}

#[test]
fn test_counts_and_percentages() {
    let src = colors().into_ref();
    let column = src.borrow().columns[1].clone();
    let freq = frequency_sheet(&src, &column, &DisplayConfig::default()).unwrap();
    assert_eq!(freq.name, "paint_color_freq");
    let names: Vec<_> = freq.columns.iter().map(|c| c.name()).collect();
    assert_eq!(names, ["color", "num", "percent", "histogram"]);

    let freq = freq.into_ref();
    let rows = cells(&freq);
    let summary: Vec<_> = rows.iter().map(|r| (r[0].as_str(), r[1].as_str(), r[2].as_str())).collect();
    assert_eq!(
        summary,
        [("red", "3", "50.00"), ("blue", "2", "33.33"), ("green", "1", "16.67")]
    );
    let total: usize = rows.iter().map(|r| r[1].parse::<usize>().unwrap()).sum();
    assert_eq!(total, src.borrow().n_rows());
}

#[test]
fn test_histogram_scales_to_largest() {
    let src = colors().into_ref();
    let column = src.borrow().columns[1].clone();
    let mut display = DisplayConfig::default();
    display.histogram_width = 6;
    let freq = frequency_sheet(&src, &column, &display).unwrap().into_ref();
    let bars: Vec<_> = cells(&freq).into_iter().map(|r| r[3].clone()).collect();
    assert_eq!(bars, ["******", "****", "**"]);
}

#[test]
fn test_empty_source() {
    let src = fields_sheet("empty", &["id"], &[]).into_ref();
    let column = src.borrow().columns[0].clone();
    let freq = frequency_sheet(&src, &column, &DisplayConfig::default()).unwrap();
    assert_eq!(freq.n_rows(), 0);
}

#[test]
fn test_bucket_selection_and_drill_down() {
    let (_dir, mut app) = test_app(AppConfig::default());
    let src = app.push_sheet(colors());
    press(&mut app, "lF");
    assert_eq!(head_name(&app), "paint_color_freq");

    // select the "red" bucket in the source; cursor steps to "blue"
    press(&mut app, "s");
    assert_eq!(cursor_row(&app), 1);
    {
        let sheet = src.borrow();
        let selected: Vec<_> = sheet.selected_rows().iter().map(|r| sheet.rows.iter().position(|x| x.ptr_eq(r)).unwrap()).collect();
        assert_eq!(selected, [0, 2, 4]);
    }

    // toggling "blue" adds its rows
    press(&mut app, " ");
    assert_eq!(src.borrow().n_selected(), 5);

    // drill into "red"
    press(&mut app, "kk");
    send(&mut app, KeyCode::Enter, KeyModifiers::NONE);
    assert_eq!(head_name(&app), "paint_red");
    assert_eq!(head_cells(&app), vec![vec!["1", "red"], vec!["3", "red"], vec!["5", "red"]]);

    // edits in the subset reach the source rows
    press(&mut app, "e");
    press(&mut app, "0");
    enter(&mut app);
    let sheet = src.borrow();
    let display = DisplayConfig::default();
    assert_eq!(sheet.columns[0].get_display_value(&sheet.rows[0], &display), "10");
}

#[test]
fn test_reload_recounts() {
    let (_dir, mut app) = test_app(AppConfig::default());
    let src = app.push_sheet(colors());
    press(&mut app, "lF");
    let freq = app.head().unwrap();

    // delete the first "red" row in the source, then recount
    ctrl(&mut app, '^');
    press(&mut app, "d");
    assert_eq!(src.borrow().n_rows(), 5);
    ctrl(&mut app, '^');
    ctrl(&mut app, 'r');

    assert!(std::rc::Rc::ptr_eq(&freq, &app.head().unwrap()));
    assert_eq!(last_status(&app), "reloaded paint_color_freq");
    let counts: Vec<_> = head_cells(&app).into_iter().map(|r| (r[0].clone(), r[1].clone())).collect();
    assert_eq!(
        counts,
        [("blue".to_string(), "2".to_string()), ("red".into(), "2".into()), ("green".into(), "1".into())]
    );
}
