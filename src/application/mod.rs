// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal each:
// training a model, answering one prediction query, or serving
// predictions over HTTP.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination

// The training workflow
pub mod train_use_case;

// The prediction service (cache + conversion + inference)
pub mod predict_use_case;

// The HTTP serving endpoint
pub mod serve_use_case;
