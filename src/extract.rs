use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

/// Fixed column order of the exported sheet.
pub const HEADER: [&str; 4] = ["image", "name", "description", "price"];

/// One scraped catalog row, in page order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub image_src: String,
    pub name: String,
    pub description: String,
    pub price: String,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Pull the four catalog fields out of every product container, in document
/// order. A container missing any sub-field aborts extraction.
pub fn extract_products(html: &str) -> Result<Vec<Product>> {
    let document = Html::parse_document(html);
    let item_sel = selector("div.inventory_item");
    let image_sel = selector("img.inventory_item_img");
    let name_sel = selector("div.inventory_item_name");
    let desc_sel = selector("div.inventory_item_desc");
    let price_sel = selector("div.inventory_item_price");

    let mut products = Vec::new();
    for (idx, item) in document.select(&item_sel).enumerate() {
        let image_src = item
            .select(&image_sel)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string)
            .with_context(|| format!("product {idx}: missing image source"))?;
        let name = field_text(&item, &name_sel)
            .with_context(|| format!("product {idx}: missing name"))?;
        let description = field_text(&item, &desc_sel)
            .with_context(|| format!("product {idx}: missing description"))?;
        let price = field_text(&item, &price_sel)
            .with_context(|| format!("product {idx}: missing price"))?;

        products.push(Product {
            image_src,
            name,
            description,
            price,
        });
    }
    Ok(products)
}

fn field_text(item: &ElementRef, sel: &Selector) -> Option<String> {
    item.select(sel)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join("").trim().to_string())
}

/// Re-serialize a document for the on-disk snapshot.
pub fn normalize(html: &str) -> String {
    Html::parse_document(html).root_element().html()
}
