use crate::error::TemplateError;
use crate::logic::TemplateRegistry;
use crate::model::{has_value, DataTemplate, FieldGenerator, Operation, Payload};
use log::info;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Field -> resource type for relationship fields whose name does not
/// already say which resource they point at
pub fn relationship_hints() -> BTreeMap<String, String> {
    [
        ("owner_id", "user"),
        ("pet_id", "pet"),
        ("veterinarian_id", "veterinarian"),
    ]
    .into_iter()
    .map(|(field, resource)| (field.to_string(), resource.to_string()))
    .collect()
}

fn positive_number(payload: &Payload, field: &str) -> bool {
    match payload.get(field) {
        None | Some(Value::Null) => true,
        Some(value) => value.as_f64().map_or(false, |n| n > 0.0),
    }
}

fn user_templates() -> Vec<DataTemplate> {
    vec![
        DataTemplate::new("user", Operation::Create)
            .with_base(json!({"role": "owner"}))
            .with_rule("email_has_at_sign", |p| {
                p.get("email")
                    .and_then(Value::as_str)
                    .map_or(true, |email| email.contains('@'))
            }),
        DataTemplate::new("user", Operation::Update),
    ]
}

fn pet_templates() -> Vec<DataTemplate> {
    vec![
        DataTemplate::new("pet", Operation::Create)
            .with_relationship("owner_id", "user")
            .with_generator(
                "temperament",
                FieldGenerator::choice(["friendly", "calm", "anxious", "playful", "shy"]),
            )
            .with_generator("weight", FieldGenerator::decimal(1.0, 45.0, 1))
            .with_rule("weight_is_positive", |p| positive_number(p, "weight")),
        DataTemplate::new("pet", Operation::Update)
            .with_rule("weight_is_positive", |p| positive_number(p, "weight")),
    ]
}

fn appointment_templates() -> Vec<DataTemplate> {
    vec![
        DataTemplate::new("appointment", Operation::Create)
            .with_base(json!({"status": "scheduled"}))
            .with_relationship("pet_id", "pet")
            .with_relationship("veterinarian_id", "veterinarian")
            .with_generator("appointment_date", FieldGenerator::date_within(1, 30))
            .with_rule("has_appointment_date", |p| has_value(p, "appointment_date")),
        DataTemplate::new("appointment", Operation::Update).with_base(json!({"status": "confirmed"})),
    ]
}

fn health_record_templates() -> Vec<DataTemplate> {
    vec![DataTemplate::new("health_record", Operation::Create)
        .with_relationship("pet_id", "pet")
        .with_relationship("veterinarian_id", "veterinarian")
        .with_generator("date", FieldGenerator::date_within(-365, 0))
        .with_rule("cost_is_positive", |p| positive_number(p, "cost"))]
}

/// Register the pet clinic templates (user, pet, appointment, health record)
pub fn load_default_templates(registry: &TemplateRegistry) -> Result<(), TemplateError> {
    let templates: Vec<DataTemplate> = user_templates()
        .into_iter()
        .chain(pet_templates())
        .chain(appointment_templates())
        .chain(health_record_templates())
        .collect();

    let count = templates.len();
    for template in templates {
        registry.register(template)?;
    }

    info!("Registered {} default data templates", count);
    Ok(())
}

/// A two-version pet clinic configuration: v1 without and v2 with health
/// records, statistics and the extended pet fields
pub fn sample_document() -> Value {
    json!({
        "versions": {
            "v1": {
                "base_url": "http://localhost:8000/api/v1",
                "features": {
                    "health_records": false,
                    "statistics": false,
                    "enhanced_filtering": false,
                    "batch_operations": false
                },
                "endpoints": {
                    "users": "/users",
                    "user_detail": "/users/{user_id}",
                    "pets": "/pets",
                    "pet_detail": "/pets/{pet_id}",
                    "owner_pets": "/users/{user_id}/pets",
                    "appointments": "/appointments",
                    "appointment_detail": "/appointments/{appointment_id}"
                },
                "schema_fields": {
                    "user_create": ["username", "email", "password", "full_name", "phone", "role"],
                    "user_update": ["email", "full_name", "phone"],
                    "pet_create": ["name", "species", "owner_id", "breed", "date_of_birth", "weight"],
                    "pet_update": ["name", "breed", "weight"],
                    "appointment_create": ["pet_id", "appointment_date", "reason", "appointment_time", "status"],
                    "appointment_update": ["appointment_date", "appointment_time", "status"]
                },
                "required_fields": {
                    "user_create": ["username", "email", "password"],
                    "pet_create": ["name", "species", "owner_id"],
                    "appointment_create": ["pet_id", "appointment_date", "reason"]
                },
                "optional_fields": {
                    "user_create": ["full_name", "phone", "role"],
                    "user_update": ["email", "full_name", "phone"],
                    "pet_create": ["breed", "date_of_birth", "weight"],
                    "pet_update": ["name", "breed", "weight"],
                    "appointment_create": ["appointment_time", "status"],
                    "appointment_update": ["appointment_date", "appointment_time", "status"]
                },
                "default_values": {
                    "pet_create": {"species": "dog"}
                }
            },
            "v2": {
                "base_url": "http://localhost:8000/api/v2",
                "features": {
                    "health_records": true,
                    "statistics": true,
                    "enhanced_filtering": true,
                    "batch_operations": true
                },
                "endpoints": {
                    "users": "/users",
                    "user_detail": "/users/{user_id}",
                    "pets": "/pets",
                    "pet_detail": "/pets/{pet_id}",
                    "owner_pets": "/users/{user_id}/pets",
                    "appointments": "/appointments",
                    "appointment_detail": "/appointments/{appointment_id}",
                    "health_records": "/pets/{pet_id}/health-records",
                    "statistics": "/statistics",
                    "pets_batch": "/pets/batch"
                },
                "schema_fields": {
                    "user_create": ["username", "email", "password", "full_name", "phone", "role", "emergency_contact"],
                    "user_update": ["email", "full_name", "phone", "emergency_contact"],
                    "pet_create": [
                        "name", "species", "owner_id", "breed", "date_of_birth", "weight",
                        "temperament", "behavioral_notes", "microchip_id"
                    ],
                    "pet_update": ["name", "breed", "weight", "temperament", "behavioral_notes"],
                    "appointment_create": [
                        "pet_id", "appointment_date", "reason", "appointment_time", "status", "veterinarian_id"
                    ],
                    "appointment_update": ["appointment_date", "appointment_time", "status", "veterinarian_id"],
                    "health_record_create": ["pet_id", "record_type", "date", "diagnosis", "treatment", "cost", "veterinarian_id"]
                },
                "required_fields": {
                    "user_create": ["username", "email", "password"],
                    "pet_create": ["name", "species", "owner_id"],
                    "appointment_create": ["pet_id", "appointment_date", "reason"],
                    "health_record_create": ["pet_id", "record_type", "date"]
                },
                "optional_fields": {
                    "user_create": ["full_name", "phone", "role", "emergency_contact"],
                    "user_update": ["email", "full_name", "phone", "emergency_contact"],
                    "pet_create": ["breed", "date_of_birth", "weight", "temperament", "behavioral_notes", "microchip_id"],
                    "pet_update": ["name", "breed", "weight", "temperament", "behavioral_notes"],
                    "appointment_create": ["appointment_time", "status", "veterinarian_id"],
                    "appointment_update": ["appointment_date", "appointment_time", "status", "veterinarian_id"],
                    "health_record_create": ["diagnosis", "treatment", "cost", "veterinarian_id"]
                },
                "default_values": {
                    "pet_create": {"species": "dog"}
                },
                "nested_fields": {
                    "user_create": {"emergency_contact": ["name", "phone"]},
                    "user_update": {"emergency_contact": ["name", "phone"]}
                }
            }
        },
        "global_settings": {
            "page_size": 20,
            "timeout_seconds": 30
        }
    })
}
