//! Prompt construction for object identification.

/// Most context names sent with a single request.
pub const MAX_CONTEXT_NAMES: usize = 50;

const BASE_PROMPT: &str = r#"You are cataloguing household items for a home inventory.
Identify every distinct physical object visible in the image(s).

Return ONLY a JSON array. Each element must be an object with:
- "name": specific product name (e.g. "Glass Wine Bottle", not "bottle"); keep model numbers and sizes
- "box_2d": [y_min, x_min, y_max, x_max] scaled 0-1000
- "brand": brand if readable, otherwise omit
- "color": dominant color
- "size": approximate size if obvious
- "category": broad category (e.g. "Kitchen", "Electronics", "Furniture")
- "confidence": 0.0-1.0
- "text": any legible text printed on the object

Do not include people, walls, floors, ceilings or windows.
If nothing can be identified, return []."#;

/// Build the prompt for a request.
///
/// `context` lists items already found so the model can reuse their names and
/// skip them unless they look different. `image_count` > 1 marks a batch of
/// frames from one walk-through.
pub fn build_prompt(context: &[String], image_count: usize) -> String {
    let mut prompt = String::from(BASE_PROMPT);

    if image_count > 1 {
        prompt.push_str(&format!(
            "\n\nThe {} images are consecutive frames of the same room. \
             Report each physical object once, with its box from the last image it appears in.",
            image_count
        ));
    }

    let names: Vec<&str> = context
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .take(MAX_CONTEXT_NAMES)
        .collect();

    if !names.is_empty() {
        prompt.push_str("\n\nItems already found (reuse these exact names when you see them again):\n");
        for name in names {
            prompt.push_str("- ");
            prompt.push_str(name);
            prompt.push('\n');
        }
    }

    prompt
}
