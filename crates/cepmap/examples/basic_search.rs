//! Basic street and postal code search
//!
//! This example demonstrates the fundamental search operations:
//! - Building a gazetteer from in-memory rows
//! - Accent-insensitive street search
//! - Postal code lookup in any formatting
//! - Broad search across neighborhood, locality and postal code

use cepmap::{
    MemoryGazetteer, QueryKind, RankedPage, SearchConfigBuilder, SearchEngine,
    data_processing::test_data::sample_rows,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let engine = SearchEngine::new(MemoryGazetteer::from_rows(sample_rows()));

    // Diacritics and case do not matter
    println!("Streets matching 'flo':");
    print_page(&engine.search("flo", QueryKind::FreeText)?);

    // Hyphenated or plain, the same record comes back
    println!("\nPostal code '77600-040':");
    print_page(&engine.search("77600-040", QueryKind::PostalCode)?);

    println!("\nNeighborhood 'setor':");
    print_page(&engine.search("setor", QueryKind::Neighborhood)?);

    // Falls through to postal code fragments when no street matches
    println!("\nBroad search for '77600':");
    print_page(&engine.search("77600", QueryKind::Broad)?);

    // Smaller pages
    let config = SearchConfigBuilder::compact().page_size(2).build();
    let compact = SearchEngine::with_config(MemoryGazetteer::from_rows(sample_rows()), config);
    println!("\nFirst two streets matching 'rua':");
    print_page(&compact.search("rua", QueryKind::FreeText)?);

    Ok(())
}

fn print_page(page: &RankedPage) {
    for (i, record) in page.records.iter().enumerate() {
        println!(
            "  {}. {} - {} ({}/{})",
            i + 1,
            record.street_name,
            record.postal_code,
            record.neighborhood.as_deref().unwrap_or("-"),
            record.locality
        );
    }
    println!("  showing {} of {}", page.shown, page.total);
}
