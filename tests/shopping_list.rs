use foodgram_api::services::shopping_list::{
    IngredientLine, SHOPPING_LIST_HEADER, ShoppingItem, consolidate, render,
};

fn line(name: &str, unit: &str, amount: i32) -> IngredientLine {
    IngredientLine {
        name: name.into(),
        measurement_unit: unit.into(),
        amount,
    }
}

#[test]
fn sums_amounts_of_the_same_ingredient_across_recipes() {
    let items = consolidate(vec![
        line("flour", "g", 200),
        line("flour", "g", 100),
        line("sugar", "g", 50),
    ]);

    assert_eq!(
        items,
        vec![
            ShoppingItem {
                name: "flour".into(),
                measurement_unit: "g".into(),
                total: 300,
            },
            ShoppingItem {
                name: "sugar".into(),
                measurement_unit: "g".into(),
                total: 50,
            },
        ]
    );
}

#[test]
fn keeps_different_units_apart() {
    let items = consolidate(vec![line("milk", "ml", 200), line("milk", "cup", 1)]);

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].measurement_unit, "cup");
    assert_eq!(items[1].measurement_unit, "ml");
}

#[test]
fn orders_items_by_name() {
    let items = consolidate(vec![
        line("water", "ml", 10),
        line("butter", "g", 20),
        line("honey", "tbsp", 1),
    ]);

    let names: Vec<_> = items.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, ["butter", "honey", "water"]);
}

#[test]
fn totals_do_not_overflow_i32() {
    let items = consolidate(vec![line("rice", "g", i32::MAX), line("rice", "g", i32::MAX)]);
    assert_eq!(items[0].total, 2 * i64::from(i32::MAX));
}

#[test]
fn renders_one_line_per_item_after_the_header() {
    let items = consolidate(vec![
        line("flour", "g", 200),
        line("flour", "g", 100),
        line("sugar", "g", 50),
    ]);

    assert_eq!(
        render(&items),
        "Shopping list:\n\nflour: 300 g\nsugar: 50 g\n"
    );
}

#[test]
fn empty_cart_renders_header_only() {
    let text = render(&consolidate(Vec::new()));
    assert_eq!(text, format!("{SHOPPING_LIST_HEADER}\n\n"));
}
