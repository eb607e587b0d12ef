// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Recipes and their expansion into task graphs
//!
//! A [`Recipe`] is a DAG of stage templates. [`render_recipe`] expands it
//! into an [`crate::execution::Execution`], producing the [`TaskGraph`] of
//! concrete tasks. Recipes can be built in code or loaded from a
//! [`RecipeFile`].

mod dag;
mod definition;
mod expansion;
mod recipe;
mod relationship;
mod validation;

pub use dag::{StageGraph, TaskGraph};
pub use definition::*;
pub use expansion::{render_recipe, Rendered};
pub use recipe::{Recipe, StageHandle, StageKind, StageTemplate};
pub use relationship::{ManyToMany, ManyToOne, OneToMany, OneToOne, Relationship, StageContext};
pub use validation::{RecipeValidator, ValidationResult};
