//! Variant set authoring.
//!
//! Variant contents are authored into an opinion container that lives on
//! the prim; the selection picks which variant a consumer composes.

use crate::scene::{SceneError, SceneResult};
use crate::usd::{is_valid_identifier, Prim, PrimPath, Specifier, Stage, StageError, StageResult, Variant, VariantSet};

/// Add a variant set with the given variants to a prim.
///
/// An existing set of the same name is extended with any missing variants.
pub fn create_variant_set(stage: &mut Stage, prim: &PrimPath, set_name: &str, variants: &[&str]) -> SceneResult<()> {
    for name in std::iter::once(&set_name).chain(variants) {
        if !is_valid_identifier(name) {
            return Err(SceneError::InvalidParameter(format!(
                "invalid variant name '{}'",
                name
            )));
        }
    }

    let target = stage.prim_mut(prim)?;
    if !target.metadata.variant_set_names.iter().any(|n| n == set_name) {
        target.metadata.variant_set_names.push(set_name.to_string());
    }

    let set_idx = match target.variant_sets.iter().position(|s| s.name == set_name) {
        Some(idx) => idx,
        None => {
            target.variant_sets.push(VariantSet {
                name: set_name.to_string(),
                variants: Vec::new(),
            });
            target.variant_sets.len() - 1
        }
    };

    let set = &mut target.variant_sets[set_idx];
    for name in variants {
        if set.variant(name).is_none() {
            set.variants.push(Variant {
                name: name.to_string(),
                contents: Prim::new(*name, Specifier::Over, None),
            });
        }
    }
    Ok(())
}

/// Select `variant_name` and author into it with `author`.
///
/// The closure receives the variant's opinion container; properties and
/// children authored on it apply to the prim when the variant is selected.
pub fn populate_variant<F>(
    stage: &mut Stage,
    prim: &PrimPath,
    set_name: &str,
    variant_name: &str,
    author: F,
) -> SceneResult<()>
where
    F: FnOnce(&mut Prim) -> StageResult<()>,
{
    let target = stage.prim_mut(prim)?;
    select(target, prim, set_name, variant_name)?;

    let variant = target
        .variant_sets
        .iter_mut()
        .find(|s| s.name == set_name)
        .and_then(|s| s.variant_mut(variant_name))
        .ok_or_else(|| StageError::VariantNotFound {
            set: set_name.to_string(),
            variant: variant_name.to_string(),
        })?;
    author(&mut variant.contents)?;
    Ok(())
}

/// Change the selected variant of a set.
pub fn switch_variant(stage: &mut Stage, prim: &PrimPath, set_name: &str, variant_name: &str) -> SceneResult<()> {
    let target = stage.prim_mut(prim)?;
    select(target, prim, set_name, variant_name)?;
    Ok(())
}

/// The current selection of a variant set, if any.
pub fn variant_selection(stage: &Stage, prim: &PrimPath, set_name: &str) -> Option<String> {
    stage
        .prim(prim)?
        .metadata
        .variant_selections
        .get(set_name)
        .cloned()
}

fn select(target: &mut Prim, path: &PrimPath, set_name: &str, variant_name: &str) -> StageResult<()> {
    let set = target
        .variant_sets
        .iter()
        .find(|s| s.name == set_name)
        .ok_or_else(|| StageError::VariantSetNotFound {
            path: path.to_string(),
            set: set_name.to_string(),
        })?;
    if set.variant(variant_name).is_none() {
        return Err(StageError::VariantNotFound {
            set: set_name.to_string(),
            variant: variant_name.to_string(),
        });
    }

    target
        .metadata
        .variant_selections
        .insert(set_name.to_string(), variant_name.to_string());
    Ok(())
}
