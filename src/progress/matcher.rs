//! Objective match predicates.

use crate::quest::{
    ObjectiveConditions, ProgressAction, QuestObjective, QuestProgressEvent, ANY_TARGET,
};

/// Whether `event` counts toward `objective`
pub fn matches_objective(objective: &QuestObjective, event: &QuestProgressEvent) -> bool {
    if objective.objective_type != event.action.objective_type() {
        return false;
    }
    target_matches(objective, &event.action) && conditions_hold(&objective.conditions, event)
}

fn target_matches(objective: &QuestObjective, action: &ProgressAction) -> bool {
    if objective.target == ANY_TARGET && objective.objective_type.allows_wildcard() {
        // "any" on a defeat objective only counts wild pokemon
        return match action {
            ProgressAction::Defeat { wild, .. } => *wild,
            _ => true,
        };
    }
    objective.target == action.target_id()
}

fn conditions_hold(conditions: &ObjectiveConditions, event: &QuestProgressEvent) -> bool {
    if conditions.is_empty() {
        return true;
    }
    let context = &event.context;
    let world = &context.world;

    if !conditions.weather.is_empty()
        && !world.weather.is_some_and(|w| conditions.weather.contains(&w))
    {
        return false;
    }
    if !conditions.time_of_day.is_empty()
        && !world
            .time_of_day
            .is_some_and(|t| conditions.time_of_day.contains(&t))
    {
        return false;
    }
    if !conditions.season.is_empty()
        && !world.season.is_some_and(|s| conditions.season.contains(&s))
    {
        return false;
    }

    if let Some(location) = &conditions.location {
        if context.location_id.as_deref() != Some(location.as_str()) {
            return false;
        }
    }

    if let Some(npc_id) = &conditions.npc_id {
        if event.action.npc_id() != Some(npc_id.as_str()) {
            return false;
        }
    }

    let needs_pokemon = !conditions.pokemon_types.is_empty()
        || conditions.min_pokemon_level.is_some()
        || conditions.shiny.is_some();
    if needs_pokemon {
        let Some(pokemon) = &context.pokemon else {
            return false;
        };
        if !conditions.pokemon_types.is_empty()
            && !pokemon.types.iter().any(|t| {
                conditions
                    .pokemon_types
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(t))
            })
        {
            return false;
        }
        if let Some(min_level) = conditions.min_pokemon_level {
            if pokemon.level < min_level {
                return false;
            }
        }
        if let Some(shiny) = conditions.shiny {
            if pokemon.shiny != shiny {
                return false;
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::{EventContext, ObjectiveType, PokemonInfo, TimeOfDay, Weather, WorldState};

    fn objective(objective_type: ObjectiveType, target: &str) -> QuestObjective {
        QuestObjective {
            id: "obj".into(),
            objective_type,
            target: target.into(),
            required_amount: 1,
            description: String::new(),
            conditions: ObjectiveConditions::default(),
        }
    }

    fn catch(pokemon_id: &str) -> QuestProgressEvent {
        QuestProgressEvent::new(ProgressAction::Catch {
            pokemon_id: pokemon_id.into(),
        })
    }

    #[test]
    fn test_exact_target() {
        let collect = objective(ObjectiveType::Collect, "oran_berry");
        let event = QuestProgressEvent::new(ProgressAction::Collect {
            item_id: "oran_berry".into(),
            amount: 2,
        });
        assert!(matches_objective(&collect, &event));

        let other = QuestProgressEvent::new(ProgressAction::Collect {
            item_id: "pecha_berry".into(),
            amount: 1,
        });
        assert!(!matches_objective(&collect, &other));
        assert!(!matches_objective(&collect, &catch("oran_berry")));
    }

    #[test]
    fn test_wildcard_rules() {
        assert!(matches_objective(&objective(ObjectiveType::Catch, "any"), &catch("25")));

        // Collect objectives never treat "any" as a wildcard
        let collect_any = objective(ObjectiveType::Collect, "any");
        let event = QuestProgressEvent::new(ProgressAction::Collect {
            item_id: "potion".into(),
            amount: 1,
        });
        assert!(!matches_objective(&collect_any, &event));

        let defeat_any = objective(ObjectiveType::Defeat, "any");
        let wild = QuestProgressEvent::new(ProgressAction::Defeat {
            target_id: "rattata".into(),
            wild: true,
            amount: 1,
        });
        let trainer = QuestProgressEvent::new(ProgressAction::Defeat {
            target_id: "youngster_joey".into(),
            wild: false,
            amount: 1,
        });
        assert!(matches_objective(&defeat_any, &wild));
        assert!(!matches_objective(&defeat_any, &trainer));
    }

    #[test]
    fn test_conditions() {
        let mut obj = objective(ObjectiveType::Catch, "any");
        obj.conditions.weather = vec![Weather::Rain];
        obj.conditions.pokemon_types = vec!["water".into()];
        obj.conditions.min_pokemon_level = Some(10);

        let context = |weather, level| EventContext {
            world: WorldState {
                weather: Some(weather),
                time_of_day: Some(TimeOfDay::Night),
                season: None,
            },
            location_id: None,
            pokemon: Some(PokemonInfo {
                species_id: "7".into(),
                types: vec!["Water".into()],
                level,
                shiny: false,
            }),
        };

        assert!(matches_objective(&obj, &catch("7").with_context(context(Weather::Rain, 12))));
        assert!(!matches_objective(&obj, &catch("7").with_context(context(Weather::Sunny, 12))));
        assert!(!matches_objective(&obj, &catch("7").with_context(context(Weather::Rain, 5))));
        // No context at all cannot satisfy a condition
        assert!(!matches_objective(&obj, &catch("7")));
    }

    #[test]
    fn test_deliver_recipient() {
        let mut obj = objective(ObjectiveType::Deliver, "parcel");
        obj.conditions.npc_id = Some("professor_oak".into());

        let deliver = |npc: &str| {
            QuestProgressEvent::new(ProgressAction::Deliver {
                item_id: "parcel".into(),
                npc_id: npc.into(),
                amount: 1,
            })
        };
        assert!(matches_objective(&obj, &deliver("professor_oak")));
        assert!(!matches_objective(&obj, &deliver("nurse_joy")));
    }
}
