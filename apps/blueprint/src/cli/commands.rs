//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api;
use crate::config::AppConfig;
use crate::loader::load_document;
use blueprint_core::{
    Blueprint, BlueprintError, DslVersion, EvaluationContext, Topology, TopologySnapshot,
    ValidatedBlueprint, VersionProfile, evaluate, validate_blueprint_with,
};
use serde_json::Value;
use std::path::Path;

fn print_json(value: &impl serde::Serialize) -> Result<(), BlueprintError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| BlueprintError::SerializationError(e.to_string()))?;
    println!("{}", rendered);
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: AppConfig) -> Result<(), BlueprintError> {
    println!("Blueprint Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:       {}", config.host);
    println!("  Port:       {}", config.port);
    println!("  Body limit: {} bytes", config.body_limit);
    if let Some(version) = config.default_version {
        println!("  Default definitions version: {}", version);
    }
    println!();
    println!("Endpoints:");
    println!("  GET  /health   - Health check");
    println!("  GET  /versions - Supported definitions versions");
    println!("  POST /validate - Validate a blueprint");
    println!("  POST /evaluate - Evaluate intrinsic functions");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(config).await
}

// =============================================================================
// VALIDATE COMMAND
// =============================================================================

/// Validate a blueprint file and print the merged result.
pub fn cmd_validate(config: &AppConfig, file: &Path, json_mode: bool) -> Result<(), BlueprintError> {
    tracing::info!("Validating {}", file.display());

    let blueprint: Blueprint = load_document(file)?;
    let validated = validate_blueprint_with(&blueprint, config.default_version)?;

    if json_mode {
        return print_json(&validated);
    }
    print_validation_summary(file, &validated);
    Ok(())
}

fn print_validation_summary(file: &Path, validated: &ValidatedBlueprint) {
    println!("Blueprint Valid");
    println!("===============");
    println!("File:    {}", file.display());
    println!("Version: {}", validated.version);
    println!();

    println!("Groups: {}", validated.groups.len());
    for (name, group) in &validated.groups {
        println!("  {} ({} members)", name, group.members.len());
        for (policy_name, policy) in &group.policies {
            println!("    policy {} [{}]", policy_name, policy.type_name);
            for (trigger_name, trigger) in &policy.triggers {
                println!("      trigger {} [{}]", trigger_name, trigger.type_name);
            }
        }
    }

    if !validated.scaling_groups.is_empty() {
        println!();
        println!("Scaling Groups: {}", validated.scaling_groups.len());
        for (name, group) in &validated.scaling_groups {
            let counts = &group.properties;
            let max = if counts.is_bounded() {
                counts.max_instances.to_string()
            } else {
                "unbounded".to_string()
            };
            println!(
                "  {} (policy {}): default {}, min {}, max {}",
                name, group.policy, counts.default_instances, counts.min_instances, max
            );
        }
    }
}

// =============================================================================
// EVALUATE COMMAND
// =============================================================================

/// Evaluate a payload file against an optional topology file.
pub fn cmd_evaluate(
    payload_path: &Path,
    topology_path: Option<&Path>,
    context: &EvaluationContext,
    json_mode: bool,
) -> Result<(), BlueprintError> {
    let mut payload: Value = load_document(payload_path)?;
    let topology = topology_path
        .map(|path| load_document::<TopologySnapshot>(path).map(Topology::from_snapshot))
        .transpose()?;

    if let Some(topology) = &topology {
        tracing::debug!(
            nodes = topology.node_count(),
            instances = topology.instance_count(),
            "topology loaded"
        );
    }

    evaluate(&mut payload, context, &topology)?;

    if json_mode {
        return print_json(&serde_json::json!({ "payload": payload }));
    }
    print_json(&payload)
}

// =============================================================================
// VERSIONS COMMAND
// =============================================================================

/// List supported definitions versions.
pub fn cmd_versions(json_mode: bool) -> Result<(), BlueprintError> {
    if json_mode {
        return print_json(&api::VersionsResponse::supported());
    }

    println!("Supported Definitions Versions");
    println!("==============================");
    for version in DslVersion::ALL {
        let features = VersionProfile::new(version).features();
        let marker = if version == DslVersion::LATEST { " (latest)" } else { "" };
        println!("{}{}", version, marker);
        if features.is_empty() {
            println!("  (base language)");
        }
        for feature in features {
            println!("  {:<12} {}", feature.element(), feature.description());
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
