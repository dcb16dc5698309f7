#![forbid(unsafe_code)]

//! Integration tests: model ↔ field synchronization through `FormBinder`.

use fbind_harness::strategies::{Edit, arb_edit, arb_profile};
use fbind_harness::{Address, Profile, ProfileForm, Recorder, bind_fruit, fruit_picker};
use fbind_runtime::binder::{ChangeCause, ModelEvent};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

// ============================================================================
// Round-trip
// ============================================================================

proptest! {
    #[test]
    fn replace_model_reaches_every_field(initial in arb_profile(), next in arb_profile()) {
        let form = ProfileForm::new(initial).expect("form");
        form.binder.replace_model(next.clone());

        prop_assert_eq!(form.name.get(), next.name.clone());
        prop_assert_eq!(form.age.get(), next.age);
        prop_assert_eq!(form.email.get(), next.email.clone());
        prop_assert_eq!(form.city.get(), next.address.city.clone());
        prop_assert_eq!(form.binder.model(), next);
    }

    #[test]
    fn typing_every_field_reproduces_model(initial in arb_profile(), target in arb_profile()) {
        let form = ProfileForm::new(initial.clone()).expect("form");
        form.type_in(&target);

        // `fruit` is not bound, so it keeps the initial value.
        let expected = Profile { fruit: initial.fruit, ..target };
        prop_assert_eq!(form.binder.model(), expected);
    }

    #[test]
    fn one_write_one_announcement(initial in arb_profile(), edits in prop::collection::vec(arb_edit(), 1..24)) {
        let form = ProfileForm::new(initial).expect("form");
        let models: Recorder<Profile> = Recorder::new();
        let _sub = form.binder.on_model_changed(models.handler());

        for (n, edit) in edits.iter().enumerate() {
            match edit {
                Edit::Name(v) => form.name.set(v.clone()),
                Edit::Age(v) => form.age.set(*v),
                Edit::Email(v) => form.email.set(v.clone()),
                Edit::City(v) => form.city.set(v.clone()),
            }
            prop_assert_eq!(models.len(), n + 1);
            prop_assert_eq!(models.last(), Some(form.binder.model()));
        }
    }
}

// ============================================================================
// No amplification
// ============================================================================

#[test]
fn single_write_single_delivery() {
    let form = ProfileForm::new(Profile::valid()).expect("form");
    let events: Recorder<ModelEvent<Profile>> = Recorder::new();
    let _sub = form.binder.on_model_event(events.handler());

    form.email.set("grace@example.com".to_string());

    let delivered = events.events();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].cause, ChangeCause::Field("email".to_string()));
    assert_eq!(delivered[0].model.email, "grace@example.com");
}

#[test]
fn replace_model_single_delivery_and_no_writeback() {
    let form = ProfileForm::new(Profile::valid()).expect("form");
    let events: Recorder<ModelEvent<Profile>> = Recorder::new();
    let _sub = form.binder.on_model_event(events.handler());

    let next = Profile {
        name: "Grace".to_string(),
        age: 45,
        email: "grace@navy.mil".to_string(),
        address: Address {
            city: "Arlington".to_string(),
        },
        fruit: None,
    };
    form.binder.replace_model(next.clone());

    let causes: Vec<ChangeCause> = events.events().into_iter().map(|e| e.cause).collect();
    assert_eq!(causes, vec![ChangeCause::Replaced]);
    assert_eq!(form.from_editors(None), next);
}

#[test]
fn nested_locator_writes_only_its_slot() {
    let form = ProfileForm::new(Profile::valid()).expect("form");
    form.city.set("Paris".to_string());

    let model = form.binder.model();
    assert_eq!(model.address.city, "Paris");
    assert_eq!(model.name, "Ada");
}

#[test]
fn selection_field_writes_optional_slot() {
    let form = ProfileForm::new(Profile::valid()).expect("form");
    let fruit = fruit_picker();
    bind_fruit(&form.binder, &fruit).expect("bind fruit");

    fruit.select("Apple".to_string());
    assert_eq!(form.binder.model().fruit.as_deref(), Some("Apple"));

    fruit.clear_selection();
    assert_eq!(form.binder.model().fruit, None);

    form.binder.update_model(|p| p.fruit = Some("Pear".to_string()));
    assert_eq!(fruit.get().as_deref(), Some("Pear"));
}

#[test]
fn field_names_in_registration_order() {
    let form = ProfileForm::new(Profile::default()).expect("form");
    assert_eq!(
        form.binder.field_names(),
        vec!["name", "age", "email", "city"]
    );
}
