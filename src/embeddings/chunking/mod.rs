
use itertools::Itertools;
use tracing::debug;

use crate::dataset::{ContactInfo, FaqEntry, ProductEntry, RecordSet};

/// Placeholder for product fields that have no value
pub const NOT_AVAILABLE: &str = "N/A";

/// Flatten the Record Set into one retrievable text chunk per record.
///
/// Order is FAQs, then products grouped by category, then a single
/// contact-info chunk that is always present. Missing fields degrade to
/// empty text or [`NOT_AVAILABLE`]; this never fails.
#[inline]
pub fn build_chunks(record_set: &RecordSet) -> Vec<String> {
    let mut chunks = Vec::with_capacity(record_set.faqs.len() + record_set.product_count() + 1);

    chunks.extend(record_set.faqs.iter().map(faq_chunk));

    for category in &record_set.bikes {
        chunks.extend(
            category
                .products
                .iter()
                .map(|product| product_chunk(&category.name, product)),
        );
    }

    chunks.push(contact_chunk(&record_set.customer_service.contact_info));

    debug!(
        "Built {} chunks (avg {} tokens)",
        chunks.len(),
        chunks.iter().map(|c| estimate_token_count(c)).sum::<usize>() / chunks.len()
    );

    chunks
}

#[inline]
pub fn faq_chunk(faq: &FaqEntry) -> String {
    format!(
        "Category: {} | Q: {} | A: {}",
        faq.category, faq.question, faq.answer
    )
}

#[inline]
pub fn product_chunk(category: &str, product: &ProductEntry) -> String {
    let on_road_price = product
        .on_road_price_hyderabad_inr
        .as_deref()
        .unwrap_or(NOT_AVAILABLE);

    let colors = if product.available_colors.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        product.available_colors.iter().join(", ")
    };

    format!(
        "Category: {category} | Model: {} | Engine: {}cc | Power: {}PS | \
         Torque: {}Nm | Starting Price: ₹{} | On-Road Price (Hyderabad): ₹{on_road_price} | \
         Colors: {colors} | Features: {}",
        product.model,
        product.engine_cc,
        product.power_ps,
        product.torque_nm,
        product.starting_price_inr,
        product.key_features,
    )
}

#[inline]
pub fn contact_chunk(contact: &ContactInfo) -> String {
    format!(
        "Customer Service: Toll-free {}, Email {}, WhatsApp {}",
        contact.toll_free_number, contact.email, contact.whatsapp_number
    )
}

/// Rough token estimate used for prompt budgeting
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // 1 token ≈ 0.75 words, plus a little for punctuation
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}
