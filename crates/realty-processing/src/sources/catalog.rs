//! Built-in layouts for the 16 known listing exports.
//!
//! Layouts are declared in source priority order: when two sources describe
//! the same listing scraped at the same moment, the earlier one wins.
//! Spreadsheet exports (`*_xlsx`, `unvan`, `emlak_az`) are read directly from
//! their workbooks.

use super::layout::{Fallback, FieldMapping, SourceLayout};
use crate::normalizer::{AreaUnit, ValueKind};
use crate::types::CanonicalField as F;

/// Names of the built-in sources, in priority order.
pub const BUILTIN_SOURCES: [&str; 16] = [
    "bina_sale",
    "ipoteka_xlsx",
    "ipoteka_csv",
    "binalar_listings",
    "yeniemlak_xlsx",
    "yeniemlak_csv",
    "myhome",
    "unvan",
    "mulk",
    "emlak_az",
    "ofis_listings",
    "real_estate_feb_2025",
    "villa_az",
    "evv_az",
    "binam_listings",
    "bina_xlsx",
];

fn area() -> ValueKind {
    ValueKind::Area {
        unit: AreaUnit::SquareMeters,
    }
}

fn updated() -> ValueKind {
    ValueKind::Timestamp { lenient: true }
}

fn scraped() -> ValueKind {
    ValueKind::Timestamp { lenient: false }
}

fn col(field: F, column: &str, kind: ValueKind) -> FieldMapping {
    FieldMapping::column(field, column, kind)
}

fn text(field: F, column: &str) -> FieldMapping {
    FieldMapping::column(field, column, ValueKind::Text)
}

fn id(column: &str) -> FieldMapping {
    text(F::SourceId, column).required()
}

fn rooms_from(column: &str) -> Fallback {
    Fallback::RoomsFromText {
        column: column.to_string(),
    }
}

/// All built-in layouts, in priority order.
pub fn builtin_layouts() -> Vec<SourceLayout> {
    vec![
        bina_sale(),
        ipoteka("ipoteka_xlsx", "ipotekaAz.xlsx"),
        ipoteka("ipoteka_csv", "ipotekaAz.csv"),
        binalar_listings(),
        yeniemlak_xlsx(),
        yeniemlak_csv(),
        myhome(),
        unvan(),
        mulk(),
        emlak_az(),
        ofis_listings(),
        real_estate_feb_2025(),
        villa_az(),
        evv_az(),
        binam_listings(),
        bina_xlsx(),
    ]
}

/// Look up a built-in layout by name.
pub fn builtin_layout(name: &str) -> Option<SourceLayout> {
    builtin_layouts().into_iter().find(|l| l.name == name)
}

/// The reference export, already in the canonical column layout.
fn bina_sale() -> SourceLayout {
    SourceLayout::new("bina_sale", "bina_sale_20251117_213934.csv")
        .map(id("id"))
        .map(col(F::AreaValue, "area_value", area()).required().unit_column("area_units"))
        .map(col(F::Leased, "leased", ValueKind::Bool))
        .map(col(F::Floor, "floor", ValueKind::Floor))
        .map(col(F::Floors, "floors", ValueKind::Integer))
        .map(col(F::Rooms, "rooms", ValueKind::Integer))
        .map(text(F::CityId, "city_id"))
        .map(text(F::CityName, "city_name"))
        .map(text(F::LocationId, "location_id"))
        .map(text(F::LocationName, "location_name"))
        .map(text(F::LocationFullName, "location_full_name"))
        .map(col(F::PriceValue, "price_value", ValueKind::Price).required())
        .map(col(F::PriceCurrency, "price_currency", ValueKind::Currency))
        .map(text(F::CompanyId, "company_id"))
        .map(text(F::CompanyName, "company_name"))
        .map(text(F::CompanyTargetType, "company_target_type"))
        .map(col(F::HasMortgage, "has_mortgage", ValueKind::Bool))
        .map(col(F::HasBillOfSale, "has_bill_of_sale", ValueKind::Bool))
        .map(col(F::HasRepair, "has_repair", ValueKind::Bool))
        .map(col(F::PaidDaily, "paid_daily", ValueKind::Bool))
        .map(col(F::IsBusiness, "is_business", ValueKind::Bool))
        .map(col(F::Vipped, "vipped", ValueKind::Bool))
        .map(col(F::Featured, "featured", ValueKind::Bool))
        .map(col(F::UpdatedAt, "updated_at", updated()))
        .map(text(F::Path, "path"))
        .map(col(F::PhotosCount, "photos_count", ValueKind::Count))
        .map(col(F::Photos, "photos", ValueKind::PhotoList))
        .map(col(F::Url, "url", ValueKind::Url))
        .map(col(F::ScrapedAt, "scraped_at", scraped()))
}

/// ipoteka.az exports carry no price column in most dumps; rows without one
/// are rejected by the invariant gate.
fn ipoteka(name: &str, file: &str) -> SourceLayout {
    SourceLayout::new(name, file)
        .map(id("announcement_id"))
        .map(col(F::AreaValue, "area", area()).required())
        .map(col(F::Floor, "flat", ValueKind::Floor))
        .map(col(F::Floors, "baxis_sayi", ValueKind::Integer))
        .map(col(F::Floors, "flat", ValueKind::TotalFloors))
        .map(col(F::Rooms, "room_count", ValueKind::Integer))
        .map(col(F::PriceValue, "price", ValueKind::Price))
        .map(col(F::HasBillOfSale, "document_type", ValueKind::Presence))
        .map(col(F::HasRepair, "repair_type", ValueKind::Presence))
        .map(col(F::UpdatedAt, "update_date", updated()))
        .map(FieldMapping::template(
            F::Url,
            "https://ipoteka.az/elan/",
            "announcement_id",
            ValueKind::Url,
        ))
}

fn binalar_listings() -> SourceLayout {
    SourceLayout::new("binalar_listings", "binalar_listings.csv")
        .map(id("id"))
        .map(col(F::AreaValue, "area", area()).required())
        .map(col(F::Rooms, "rooms", ValueKind::Integer))
        .map(col(F::Floor, "floor", ValueKind::Floor))
        .map(col(F::Floors, "floor", ValueKind::TotalFloors))
        .map(col(F::PriceValue, "price_raw", ValueKind::Price).required())
        .map(text(F::LocationName, "address"))
        .map(col(F::Url, "url", ValueKind::Url))
        .map(col(F::UpdatedAt, "date", updated()))
        .fallback(rooms_from("description"))
}

/// Link-only dump: every row lacks area and price.
fn yeniemlak_xlsx() -> SourceLayout {
    SourceLayout::new("yeniemlak_xlsx", "yeniemlak.xlsx")
        .map(FieldMapping::row_number(F::SourceId))
        .map(col(F::Url, "link", ValueKind::Url).required())
}

fn yeniemlak_csv() -> SourceLayout {
    SourceLayout::new("yeniemlak_csv", "yeniemlakAz.csv")
        .map(text(F::SourceId, "id"))
        .map(FieldMapping::row_number(F::SourceId))
        .map(col(F::AreaValue, "area", area()).required())
        .map(col(F::PriceValue, "price", ValueKind::Price))
        .map(col(F::Rooms, "room_count", ValueKind::Integer))
        .map(FieldMapping::first_of(F::Floor, &["flat", "floor"], ValueKind::Floor))
        .map(FieldMapping::first_of(F::Floors, &["flat", "floor"], ValueKind::TotalFloors))
        .map(text(F::LocationName, "address"))
        .map(text(F::LocationFullName, "address_2"))
        .map(col(F::Url, "href", ValueKind::Url))
        .map(col(F::UpdatedAt, "date", updated()))
        .map(col(F::HasBillOfSale, "doc_type", ValueKind::Presence))
        .fallback(rooms_from("description"))
}

fn myhome() -> SourceLayout {
    SourceLayout::new("myhome", "myhome_listings_20250929_003143.csv")
        .map(id("id"))
        .map(col(F::AreaValue, "area", area()).required())
        .map(col(F::Rooms, "room_count", ValueKind::Integer))
        .map(col(F::Floor, "floor", ValueKind::Floor))
        .map(col(F::Floors, "floor_count", ValueKind::Integer))
        .map(text(F::CityName, "city"))
        .map(text(F::LocationName, "region"))
        .map(text(F::LocationFullName, "address"))
        .map(col(F::PriceValue, "price", ValueKind::Price).required())
        .map(col(F::HasRepair, "is_repaired", ValueKind::Bool))
        .map(col(F::Vipped, "is_vip", ValueKind::Bool))
        .map(col(F::Featured, "is_premium", ValueKind::Bool))
        .map(col(F::HasMortgage, "credit_possible", ValueKind::Bool))
        .map(col(F::UpdatedAt, "formatted_date", updated()))
}

fn unvan() -> SourceLayout {
    SourceLayout::new("unvan", "unvan.xlsx")
        .map(id("id"))
        .map(col(F::AreaValue, "area", area()).required())
        .map(col(F::Rooms, "room_count", ValueKind::FirstInteger))
        .map(col(F::PriceValue, "price", ValueKind::Price).required())
        .map(text(F::LocationName, "address"))
        .map(text(F::LocationFullName, "address_2"))
        .map(text(F::CompanyName, "owner"))
        .map(col(F::UpdatedAt, "date", updated()))
        .map(col(F::Url, "link", ValueKind::Url))
        .fallback(rooms_from("short_descr"))
}

fn mulk() -> SourceLayout {
    SourceLayout::new("mulk", "mulk_data_20250929_143644.csv")
        .map(id("listing_id"))
        .map(col(F::AreaValue, "area_numeric", area()).required())
        .map(col(F::Rooms, "rooms_numeric", ValueKind::Integer))
        .map(col(F::Floor, "current_floor", ValueKind::Floor))
        .map(col(F::Floors, "total_floors", ValueKind::Integer))
        .map(col(F::PriceValue, "price_numeric", ValueKind::Price).required())
        .map(text(F::LocationName, "location_district"))
        .map(text(F::LocationFullName, "full_address"))
        .map(col(
            F::HasBillOfSale,
            "deed_available",
            ValueKind::Equals {
                value: "Yes".to_string(),
            },
        ))
        .map(col(F::UpdatedAt, "listing_date", updated()))
        .map(col(F::Url, "url", ValueKind::Url))
        .map(col(F::PhotosCount, "image_count", ValueKind::Count))
        .map(col(F::ScrapedAt, "scraped_at", scraped()))
}

fn emlak_az() -> SourceLayout {
    SourceLayout::new("emlak_az", "emlakAz.xlsx")
        .map(id("id"))
        .map(col(F::AreaValue, "area", area()).required())
        .map(col(F::Rooms, "room_count", ValueKind::FirstInteger))
        .map(col(F::Floor, "flat", ValueKind::Floor))
        .map(col(F::Floors, "flat", ValueKind::TotalFloors))
        .map(col(F::PriceValue, "price", ValueKind::Price).required())
        .map(col(F::HasRepair, "repair_type", ValueKind::Presence))
        .map(col(F::HasBillOfSale, "document_type", ValueKind::Presence))
        .map(col(F::UpdatedAt, "date", updated()))
        .map(FieldMapping::template(F::Url, "https://emlak.az", "href", ValueKind::Url))
}

fn ofis_listings() -> SourceLayout {
    SourceLayout::new("ofis_listings", "ofis_listings.csv")
        .map(id("listing_id"))
        .map(col(F::AreaValue, "Sahə", area()).required())
        .map(col(F::Rooms, "Otaq Sayı", ValueKind::FirstInteger))
        .map(col(F::Floor, "Mərtəbə", ValueKind::Floor))
        .map(col(F::Floors, "Mərtəbə sayı", ValueKind::Integer))
        .map(col(F::PriceValue, "price", ValueKind::Price).required())
        .map(text(F::CityName, "Şəhər"))
        .map(text(F::LocationName, "Ünvan"))
        .map(col(F::UpdatedAt, "date", updated()))
        .map(col(F::Url, "url", ValueKind::Url))
        .map(FieldMapping::constant(F::IsBusiness, "true", ValueKind::Bool))
}

fn real_estate_feb_2025() -> SourceLayout {
    SourceLayout::new("real_estate_feb_2025", "real_estate_data_25_feb_2025.csv")
        .map(id("id"))
        .map(col(F::AreaValue, "area", area()).required())
        .map(col(F::Rooms, "rooms", ValueKind::Integer))
        .map(col(F::Floor, "floor", ValueKind::Floor))
        .map(col(F::Floors, "total_floors", ValueKind::Integer))
        .map(col(F::PriceValue, "price", ValueKind::Price).required())
        .map(col(F::PriceCurrency, "currency", ValueKind::Currency))
        .map(text(F::CityName, "district"))
        .map(FieldMapping::first_of(
            F::LocationName,
            &["location", "address"],
            ValueKind::Text,
        ))
        .map(text(F::LocationFullName, "address"))
        .map(col(F::HasRepair, "has_repair", ValueKind::Bool))
        .map(FieldMapping::first_of(
            F::UpdatedAt,
            &["updated_at", "listing_date"],
            updated(),
        ))
        .map(col(F::Url, "source_url", ValueKind::Url))
        .map(col(F::ScrapedAt, "created_at", scraped()))
        .map(col(F::Photos, "photos", ValueKind::PhotoList))
}

fn villa_az() -> SourceLayout {
    SourceLayout::new("villa_az", "villa_az_complete_dataset.csv")
        .map(id("listing_id"))
        .map(col(F::AreaValue, "Sahə, m²", area()).required())
        .map(col(F::Rooms, "Otaq sayı", ValueKind::FirstInteger))
        .map(col(F::Floor, "Mərtəbə", ValueKind::Floor))
        .map(col(F::PriceValue, "price", ValueKind::Price).required())
        .map(text(F::CityName, "Şəhər"))
        .map(text(F::LocationName, "address"))
        .map(col(F::HasBillOfSale, "Əmlak sənədi", ValueKind::Presence))
        .map(col(F::UpdatedAt, "date", updated()))
        .map(col(F::Url, "url", ValueKind::Url))
        .fallback(rooms_from("description"))
}

fn evv_az() -> SourceLayout {
    SourceLayout::new("evv_az", "evv_az_listings.csv")
        .map(id("listing_id"))
        .map(col(F::AreaValue, "area", area()).required())
        .map(col(F::Rooms, "rooms", ValueKind::FirstInteger))
        .map(col(F::Floor, "floor", ValueKind::Floor))
        .map(col(F::Floors, "floor", ValueKind::TotalFloors))
        .map(col(F::PriceValue, "price", ValueKind::Price).required())
        .map(text(F::CityName, "city"))
        .map(text(F::LocationName, "location"))
        .map(col(F::HasBillOfSale, "document", ValueKind::Presence))
        .map(col(F::HasMortgage, "mortgage", ValueKind::Presence))
        .map(FieldMapping::first_of(
            F::UpdatedAt,
            &["update_date", "post_date"],
            updated(),
        ))
        .map(col(F::Url, "url", ValueKind::Url))
        .fallback(rooms_from("title"))
}

fn binam_listings() -> SourceLayout {
    SourceLayout::new("binam_listings", "binam_listings_1758793717.csv")
        .map(id("listing_code"))
        .map(col(F::AreaValue, "area", area()).required())
        .map(col(F::Rooms, "rooms", ValueKind::FirstInteger))
        .map(col(F::Floor, "floor", ValueKind::Floor))
        .map(col(F::Floors, "floor", ValueKind::TotalFloors))
        .map(col(F::PriceValue, "price", ValueKind::Price).required())
        .map(text(F::CityName, "country_city"))
        .map(text(F::LocationName, "district"))
        .map(text(F::LocationFullName, "address"))
        .map(text(F::CompanyName, "company_name"))
        .map(col(F::UpdatedAt, "listing_date", updated()))
        .map(col(F::Url, "url", ValueKind::Url))
}

fn bina_xlsx() -> SourceLayout {
    SourceLayout::new("bina_xlsx", "bina.xlsx")
        .map(id("item_id"))
        .map(col(F::AreaValue, "area", area()).required())
        .map(col(F::Rooms, "room count", ValueKind::FirstInteger))
        .map(col(F::Floor, "floor", ValueKind::Floor))
        .map(col(F::Floors, "floor", ValueKind::TotalFloors))
        .map(col(F::PriceValue, "price", ValueKind::Price).required())
        .map(col(F::PriceCurrency, "currency", ValueKind::Currency))
        .map(col(F::HasMortgage, "mortgage", ValueKind::Presence))
        .map(col(F::Url, "url", ValueKind::Url))
}
