use super::ui;
use crate::core::glossary::{Section, terms};
use comfy_table::{Attribute, Cell, Table};

pub fn section_table(section: Section) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Term"), ui::header_cell("Meaning")]);
    for term in terms(section) {
        table.add_row(vec![
            Cell::new(term.title).add_attribute(Attribute::Bold),
            Cell::new(term.text),
        ]);
    }
    table
}

pub fn run() {
    println!("{}", ui::style_text("Financial Glossary", ui::StyleType::Title));
    for section in [Section::MarketIndicators, Section::YieldTypes] {
        println!("\n{}", ui::style_text(section.title(), ui::StyleType::Label));
        println!("{}", section_table(section));
    }
}
