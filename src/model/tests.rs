//! Model integration tests.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use crate::error::ModelError;
    use crate::model::{
        Attr, DocumentModel, Finder, FnHook, HookOutcome, LifecycleEvent, Related,
    };
    use crate::scenario::Scenario;
    use crate::schema::validators::{RequiredValidator, SubDocumentValidator};
    use crate::schema::{ModelSchema, RelationDecl, ReturnShape};
    use crate::store::memory::MemoryBackend;
    use crate::store::{Connection, RawDocument};

    /// Schemas shared across tests. Registration replaces by name, so
    /// re-registering the same shapes from concurrent tests is harmless.
    fn register_fixtures() {
        ModelSchema::builder("Address")
            .fields(["city", "zip", "country"])
            .register()
            .unwrap();
        ModelSchema::builder("Item")
            .fields(["sku", "qty"])
            .validator(RequiredValidator::new(["sku"]))
            .register()
            .unwrap();
        ModelSchema::builder("Profile")
            .fields(["bio", "user_id"])
            .register()
            .unwrap();
        ModelSchema::builder("Post")
            .fields(["title", "author_id", "status"])
            .register()
            .unwrap();
        ModelSchema::builder("Tag")
            .fields(["label"])
            .register()
            .unwrap();
        ModelSchema::builder("Customer")
            .fields(["name", "status", "mentor_ref", "buddy_refs", "tag_ids"])
            .embeds_one("address", "Address")
            .embeds_many("items", "Item")
            .validator(RequiredValidator::new(["name"]).on([Scenario::Insert]))
            .validator(SubDocumentValidator::new(["address", "items"]))
            .relation("profile", RelationDecl::one("Profile").foreign_key("user_id"))
            .relation("posts", RelationDecl::many("Post").foreign_key("author_id"))
            .relation(
                "post_docs",
                RelationDecl::many("Post")
                    .foreign_key("author_id")
                    .shape(ReturnShape::Array),
            )
            .relation(
                "post_cursor",
                RelationDecl::many("Post")
                    .foreign_key("author_id")
                    .shape(ReturnShape::Cursor),
            )
            .relation(
                "latest_post",
                RelationDecl::one("Post")
                    .foreign_key("author_id")
                    .shape(ReturnShape::Array),
            )
            .relation(
                "posts_live",
                RelationDecl::many("Post")
                    .foreign_key("author_id")
                    .filter(json!({"status": "live"})),
            )
            .relation("mentor", RelationDecl::one("Customer").local_key("mentor_ref"))
            .relation(
                "buddies",
                RelationDecl::many("Customer").local_key("buddy_refs"),
            )
            .relation("tags", RelationDecl::many("Tag").local_key("tag_ids"))
            .register()
            .unwrap();
    }

    fn connection() -> (Arc<Connection>, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (Arc::new(Connection::new(backend.clone())), backend)
    }

    fn customer(conn: &Arc<Connection>) -> DocumentModel {
        DocumentModel::with_connection(
            ModelSchema::lookup("Customer").unwrap(),
            Scenario::Insert,
            conn.clone(),
        )
    }

    fn doc(value: Value) -> RawDocument {
        value.as_object().cloned().unwrap()
    }

    // ------------------------------------------------------------------
    // Sub-documents
    // ------------------------------------------------------------------

    #[test]
    fn test_single_sub_document_round_trip() {
        register_fixtures();
        let (conn, _) = connection();
        let mut model = customer(&conn);

        model
            .set("address", json!({"city": "Lyon", "zip": "69001"}))
            .unwrap();
        assert!(matches!(model.get("address").unwrap(), Attr::Single(_)));

        let document = model.get_document(None).unwrap();
        assert_eq!(
            document["address"],
            json!({"city": "Lyon", "zip": "69001", "country": null})
        );
    }

    #[test]
    fn test_assigning_null_clears_single_slot_in_place() {
        register_fixtures();
        let (conn, _) = connection();
        let mut model = customer(&conn);

        model
            .set("address", json!({"city": "Lyon", "zip": "69001"}))
            .unwrap();
        model.set("address", json!(null)).unwrap();

        // The slot survives; its fields are nulled.
        assert!(matches!(model.get("address").unwrap(), Attr::Single(_)));
        let document = model.get_document(None).unwrap();
        assert_eq!(
            document["address"],
            json!({"city": null, "zip": null, "country": null})
        );
    }

    #[test]
    fn test_multi_sub_document_preserves_order() {
        register_fixtures();
        let (conn, _) = connection();
        let mut model = customer(&conn);

        model
            .set(
                "items",
                json!([{"sku": "a-1", "qty": 2}, {"sku": "b-2", "qty": 1}]),
            )
            .unwrap();
        let document = model.get_document(None).unwrap();
        assert_eq!(
            document["items"],
            json!([{"sku": "a-1", "qty": 2}, {"sku": "b-2", "qty": 1}])
        );

        // Null empties the list without dropping the slot.
        model.set("items", json!(null)).unwrap();
        assert_eq!(model.get_document(None).unwrap()["items"], json!([]));
    }

    #[test]
    fn test_sub_document_value_type_errors() {
        register_fixtures();
        let (conn, _) = connection();
        let mut model = customer(&conn);

        let err = model.set("address", json!("downtown")).unwrap_err();
        assert!(matches!(err, ModelError::InvalidSubDocumentValue { .. }));

        let err = model
            .set_sub_document("warehouse", json!({"city": "x"}))
            .unwrap_err();
        assert!(matches!(err, ModelError::UnknownSubDocument { .. }));
    }

    #[test]
    fn test_population_builds_typed_slots() {
        register_fixtures();
        let (conn, _) = connection();
        let model = DocumentModel::from_document_with_connection(
            ModelSchema::lookup("Customer").unwrap(),
            conn,
            json!({
                "_id": "c9",
                "name": "Ana",
                "address": {"city": "Rio"},
                "items": [{"sku": "s-1", "qty": 1}],
            }),
        );
        let mut model = model.unwrap();

        assert_eq!(model.scenario(), &Scenario::Update);
        let address = model.get("address").unwrap().as_single().unwrap();
        assert_eq!(address.attributes().get("city"), Some(&json!("Rio")));
        let items = model.get("items").unwrap().as_multi().unwrap();
        assert_eq!(items.len(), 1);
    }

    // ------------------------------------------------------------------
    // Relations
    // ------------------------------------------------------------------

    #[test]
    fn test_empty_one_relation_caches_null() {
        register_fixtures();
        let (conn, backend) = connection();
        let mut model = customer(&conn);
        model.set("_id", json!("c1")).unwrap();

        assert!(model.related("profile").unwrap().is_null());
        let queries = backend.query_count();

        // Cached null is authoritative: no re-query, still null.
        assert!(model.related("profile").unwrap().is_null());
        let empty = RawDocument::new();
        assert!(model
            .get_related("profile", false, Some(&empty))
            .unwrap()
            .is_null());
        assert_eq!(backend.query_count(), queries);

        // And the relation reads as not-set.
        assert!(!model.is_attribute_set("profile").unwrap());
    }

    #[test]
    fn test_many_array_shape_yields_empty_list_not_null() {
        register_fixtures();
        let (conn, _) = connection();
        let mut model = customer(&conn);
        model.set("_id", json!("c1")).unwrap();

        let related = model.related("post_docs").unwrap();
        assert_eq!(related.as_documents(), Some(&[][..]));
    }

    #[test]
    fn test_many_model_shape_populates_matches() {
        register_fixtures();
        let (conn, backend) = connection();
        backend.seed(
            "posts",
            [
                json!({"_id": "p1", "title": "first", "author_id": "c1"}),
                json!({"_id": "p2", "title": "other", "author_id": "zz"}),
                json!({"_id": "p3", "title": "third", "author_id": "c1"}),
            ],
        );
        let mut model = customer(&conn);
        model.set("_id", json!("c1")).unwrap();

        let posts = model.related("posts").unwrap().as_models().unwrap();
        let titles: Vec<&Value> = posts
            .iter()
            .map(|p| p.attributes().get("title").unwrap())
            .collect();
        assert_eq!(titles, [&json!("first"), &json!("third")]);
    }

    #[test]
    fn test_refresh_and_criteria_replace_cache() {
        register_fixtures();
        let (conn, backend) = connection();
        backend.seed(
            "posts",
            [json!({"_id": "p1", "title": "first", "author_id": "c1", "status": "live"})],
        );
        let mut model = customer(&conn);
        model.set("_id", json!("c1")).unwrap();

        assert_eq!(model.related("posts").unwrap().as_models().unwrap().len(), 1);

        backend.seed(
            "posts",
            [json!({"_id": "p2", "title": "late", "author_id": "c1", "status": "draft"})],
        );
        // Cache still serves the old result until a refresh forces a lookup.
        assert_eq!(model.related("posts").unwrap().as_models().unwrap().len(), 1);
        assert_eq!(
            model
                .get_related("posts", true, None)
                .unwrap()
                .as_models()
                .unwrap()
                .len(),
            2
        );

        // Extra criteria force a lookup and the filtered result replaces the
        // cache.
        let live_only = doc(json!({"status": "live"}));
        assert_eq!(
            model
                .get_related("posts", false, Some(&live_only))
                .unwrap()
                .as_models()
                .unwrap()
                .len(),
            1
        );
        assert_eq!(model.related("posts").unwrap().as_models().unwrap().len(), 1);
    }

    #[test]
    fn test_declared_filter_restricts_matches() {
        register_fixtures();
        let (conn, backend) = connection();
        backend.seed(
            "posts",
            [
                json!({"_id": "p1", "author_id": "c1", "status": "live"}),
                json!({"_id": "p2", "author_id": "c1", "status": "draft"}),
            ],
        );
        let mut model = customer(&conn);
        model.set("_id", json!("c1")).unwrap();

        let live = model.related("posts_live").unwrap().as_models().unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].attributes().get("status"), Some(&json!("live")));
    }

    #[test]
    fn test_one_relation_array_shape_returns_plain_document() {
        register_fixtures();
        let (conn, backend) = connection();
        backend.seed(
            "posts",
            [json!({"_id": "p1", "title": "first", "author_id": "c1"})],
        );
        let mut model = customer(&conn);
        model.set("_id", json!("c1")).unwrap();

        let document = model
            .related("latest_post")
            .unwrap()
            .as_document()
            .cloned()
            .unwrap();
        assert_eq!(document.get("title"), Some(&json!("first")));
    }

    #[test]
    fn test_cursor_shape_stays_lazy() {
        register_fixtures();
        let (conn, backend) = connection();
        backend.seed(
            "posts",
            [
                json!({"_id": "p1", "author_id": "c1"}),
                json!({"_id": "p2", "author_id": "c1"}),
            ],
        );
        let mut model = customer(&conn);
        model.set("_id", json!("c1")).unwrap();

        model.related("post_cursor").unwrap();
        let cursor = model
            .take_related("post_cursor")
            .and_then(Related::into_cursor)
            .unwrap();
        let fetched: Vec<Value> = cursor.map(Result::unwrap).collect();
        assert_eq!(fetched.len(), 2);

        // Taking the cached value means the next read resolves again.
        assert!(!model.has_related("post_cursor"));
    }

    #[test]
    fn test_reference_join_key_dereferences() {
        register_fixtures();
        let (conn, backend) = connection();
        backend.seed("customers", [json!({"_id": "m1", "name": "Mentor"})]);
        let mut model = customer(&conn);
        model
            .set("mentor_ref", json!({"$ref": "customers", "$id": "m1"}))
            .unwrap();

        let mentor = model.related("mentor").unwrap().as_model().unwrap();
        assert_eq!(mentor.attributes().get("name"), Some(&json!("Mentor")));
    }

    #[test]
    fn test_reference_list_skips_unresolvable_items() {
        register_fixtures();
        let (conn, backend) = connection();
        backend.seed(
            "customers",
            [json!({"_id": "b1", "name": "One"}), json!({"_id": "b3", "name": "Three"})],
        );
        let mut model = customer(&conn);
        model
            .set(
                "buddy_refs",
                json!([
                    {"$ref": "customers", "$id": "b1"},
                    {"$ref": "customers", "$id": "b2"},
                    {"$ref": "customers", "$id": "b3"},
                ]),
            )
            .unwrap();

        let buddies = model.related("buddies").unwrap().as_models().unwrap();
        assert_eq!(buddies.len(), 2);
    }

    #[test]
    fn test_list_join_key_matches_with_in_clause() {
        register_fixtures();
        let (conn, backend) = connection();
        backend.seed(
            "tags",
            [
                json!({"_id": 1, "label": "alpha"}),
                json!({"_id": 2, "label": "beta"}),
                json!({"_id": 3, "label": "gamma"}),
            ],
        );
        let mut model = customer(&conn);
        model.set("tag_ids", json!([1, 3])).unwrap();

        let tags = model.related("tags").unwrap().as_models().unwrap();
        let labels: Vec<&Value> = tags
            .iter()
            .map(|t| t.attributes().get("label").unwrap())
            .collect();
        assert_eq!(labels, [&json!("alpha"), &json!("gamma")]);
    }

    #[test]
    fn test_unknown_relation_and_missing_target() {
        register_fixtures();
        let (conn, _) = connection();
        let mut model = customer(&conn);

        let err = model.get_related("ghost", false, None).unwrap_err();
        assert!(matches!(err, ModelError::UnknownRelation { .. }));
        // An undeclared name still reads as null through the protocol.
        assert!(model.get("ghost").unwrap().is_null());

        ModelSchema::builder("OrphanOwner")
            .field("friend_id")
            .relation("friend", RelationDecl::one("NeverRegistered"))
            .register()
            .unwrap();
        let mut orphan = DocumentModel::with_connection(
            ModelSchema::lookup("OrphanOwner").unwrap(),
            Scenario::Insert,
            conn.clone(),
        );
        orphan.set("friend_id", json!("f1")).unwrap();
        assert!(matches!(
            orphan.related("friend").unwrap_err(),
            ModelError::UnknownModel(_)
        ));
    }

    #[test]
    fn test_sub_document_wins_over_relation_on_write() {
        register_fixtures();
        ModelSchema::builder("DualOwner")
            .field("name")
            .embeds_one("meta", "Address")
            .relation("meta", RelationDecl::one("Profile"))
            .register()
            .unwrap();
        let (conn, _) = connection();
        let mut model = DocumentModel::with_connection(
            ModelSchema::lookup("DualOwner").unwrap(),
            Scenario::Insert,
            conn,
        );

        model.set("meta", json!({"city": "Oslo"})).unwrap();
        assert!(matches!(model.get("meta").unwrap(), Attr::Single(_)));
        // The relation cache is untouched by the write.
        assert!(!model.has_related("meta"));
    }

    // ------------------------------------------------------------------
    // Attribute protocol
    // ------------------------------------------------------------------

    #[test]
    fn test_null_attribute_lets_declared_layers_resolve() {
        register_fixtures();
        let (conn, _) = connection();
        let mut model = customer(&conn);

        // A null plain attribute does not shadow the declared sub-document.
        model.attributes.set("address", json!(null));
        assert!(matches!(model.get("address").unwrap(), Attr::Single(_)));

        // A non-null plain attribute does.
        model.attributes.set("address", json!("plain"));
        assert_eq!(
            model.get("address").unwrap().as_value(),
            Some(&json!("plain"))
        );
    }

    #[test]
    fn test_unset_checks_stores_in_order() {
        register_fixtures();
        let (conn, _) = connection();
        let mut model = customer(&conn);

        model.set("name", json!("Ana")).unwrap();
        model.unset("name");
        assert!(!model.attributes().contains("name"));

        model.set("address", json!({"city": "Lyon"})).unwrap();
        model.unset("address");
        // The cached slot is gone; the next read resolves a fresh empty one.
        let fresh = model.get("address").unwrap().as_single().unwrap();
        assert_eq!(fresh.attributes().len(), 0);
    }

    #[test]
    fn test_typed_values_flatten_into_plain_store() {
        register_fixtures();
        let (conn, _) = connection();
        let mut model = customer(&conn);

        let mut loose = DocumentModel::with_connection(
            ModelSchema::lookup("Address").unwrap(),
            Scenario::Insert,
            conn.clone(),
        );
        loose.set("city", json!("Turin")).unwrap();

        // "extra" is declared nowhere, so the typed value flattens.
        model.set("extra", loose).unwrap();
        let stored = model.attributes().get("extra").unwrap();
        assert_eq!(
            stored,
            &json!({"city": "Turin", "zip": null, "country": null})
        );
    }

    #[test]
    fn test_attribute_names_union_in_order() {
        register_fixtures();
        let (conn, _) = connection();
        let mut model = customer(&conn);
        model.set("nickname", json!("ana")).unwrap();

        let names = model.attribute_names();
        assert_eq!(
            names,
            [
                "name",
                "status",
                "mentor_ref",
                "buddy_refs",
                "tag_ids",
                "nickname",
                "address",
                "items"
            ]
        );
        assert!(model.has_attribute("nickname"));
        assert!(!model.has_attribute("profile"));
    }

    #[test]
    fn test_search_scenario_collects_criteria() {
        register_fixtures();
        let (conn, _) = connection();
        let mut model = customer(&conn);
        model.set_scenario(Scenario::Search);
        model.set("status", json!("active")).unwrap();

        let document = model.get_document(None).unwrap();
        assert_eq!(document["status"], json!("active"));
        assert_eq!(document["name"], json!(null));
    }

    #[test]
    fn test_get_document_explicit_fields() {
        register_fixtures();
        let (conn, _) = connection();
        let mut model = customer(&conn);
        model.set("name", json!("Ana")).unwrap();
        model.set("status", json!("active")).unwrap();

        let fields = ["name".to_string()];
        let document = model.get_document(Some(&fields)).unwrap();
        assert_eq!(Value::Object(document), json!({"name": "Ana"}));
    }

    #[test]
    fn test_clean_resets_every_layer() {
        register_fixtures();
        let (conn, backend) = connection();
        backend.seed(
            "posts",
            [json!({"_id": "p1", "author_id": "c1"})],
        );
        let mut model = customer(&conn);
        model.set("_id", json!("c1")).unwrap();
        model.set("name", json!("Ana")).unwrap();
        model.set("address", json!({"city": "Lyon"})).unwrap();
        model.related("posts").unwrap();

        model.clean().unwrap();

        assert!(!model.has_related("posts"));
        let document = model.get_document(None).unwrap();
        assert_eq!(document["name"], json!(null));
        assert_eq!(
            document["address"],
            json!({"city": null, "zip": null, "country": null})
        );
        assert_eq!(document["items"], json!([]));
    }

    // ------------------------------------------------------------------
    // Bracket paths and requiredness
    // ------------------------------------------------------------------

    #[test]
    fn test_parse_attribute_name() {
        register_fixtures();
        let (conn, _) = connection();
        let model = customer(&conn);

        assert_eq!(model.parse_attribute_name("address[city]"), "address");
        assert_eq!(model.parse_attribute_name("items[0][sku]"), "items");
        assert_eq!(model.parse_attribute_name("name"), "name");
        assert_eq!(model.parse_attribute_name("warehouse[city]"), "warehouse[city]");
        assert_eq!(model.parse_attribute_name(""), "");
    }

    #[test]
    fn test_parse_attribute_name_overlapping_prefixes() {
        register_fixtures();
        ModelSchema::builder("OvlOwner")
            .embeds_one("addr", "Address")
            .embeds_one("address", "Address")
            .register()
            .unwrap();
        let (conn, _) = connection();
        let model = DocumentModel::with_connection(
            ModelSchema::lookup("OvlOwner").unwrap(),
            Scenario::Insert,
            conn,
        );

        // `addr` is declared first but only matches its own bracket prefix.
        assert_eq!(model.parse_attribute_name("addr[x]"), "addr");
        assert_eq!(model.parse_attribute_name("address[city]"), "address");
    }

    #[test]
    fn test_required_checks_follow_scenario_and_paths() {
        register_fixtures();
        let (conn, _) = connection();
        let mut model = customer(&conn);

        assert!(model.is_attribute_required("name").unwrap());
        model.set_scenario(Scenario::Update);
        assert!(!model.is_attribute_required("name").unwrap());
        model.set_scenario(Scenario::Insert);

        // Empty list: no entry can report the nested attribute required.
        assert!(!model.is_attribute_required("items[0][sku]").unwrap());

        model.set("items", json!([{"qty": 1}])).unwrap();
        assert!(model.is_attribute_required("items[0][sku]").unwrap());
        // Index with no attribute group asks nothing.
        assert!(!model.is_attribute_required("items[0]").unwrap());
        // Nested attribute without a required validator.
        assert!(!model.is_attribute_required("address[city]").unwrap());
    }

    #[test]
    fn test_validate_reports_nested_errors() {
        register_fixtures();
        let (conn, _) = connection();
        let mut model = customer(&conn);
        model.set("items", json!([{"qty": 1}])).unwrap();

        let errors = model.validate();
        let paths: Vec<&str> = errors.iter().map(|e| e.attribute.as_str()).collect();
        assert!(paths.contains(&"name"));
        assert!(paths.contains(&"items[0][sku]"));
    }

    // ------------------------------------------------------------------
    // Lifecycle events
    // ------------------------------------------------------------------

    #[test]
    fn test_before_save_aggregates_across_sub_documents() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_hook = seen.clone();
        ModelSchema::builder("HkLine")
            .fields(["sku"])
            .hook(FnHook::on(LifecycleEvent::BeforeSave, move |_, _| {
                seen_in_hook.fetch_add(1, Ordering::SeqCst);
                HookOutcome::Cancel
            }))
            .register()
            .unwrap();
        ModelSchema::builder("HkOrder")
            .fields(["ref"])
            .embeds_many("lines", "HkLine")
            .hook(FnHook::on(LifecycleEvent::BeforeSave, |_, _| {
                HookOutcome::Proceed
            }))
            .register()
            .unwrap();

        let (conn, backend) = connection();
        let mut order = DocumentModel::with_connection(
            ModelSchema::lookup("HkOrder").unwrap(),
            Scenario::Insert,
            conn,
        );
        order
            .set("lines", json!([{"sku": "a"}, {"sku": "b"}]))
            .unwrap();

        assert!(!order.save().unwrap());
        // Every entry was visited even though the first already cancelled.
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert!(backend.documents("hk_orders").is_empty());
    }

    #[test]
    fn test_events_skip_when_owner_has_no_handler() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_hook = seen.clone();
        ModelSchema::builder("HkQuietLine")
            .fields(["sku"])
            .hook(FnHook::on(LifecycleEvent::BeforeSave, move |_, _| {
                seen_in_hook.fetch_add(1, Ordering::SeqCst);
                HookOutcome::Cancel
            }))
            .register()
            .unwrap();
        ModelSchema::builder("HkQuietOrder")
            .fields(["ref"])
            .embeds_many("lines", "HkQuietLine")
            .register()
            .unwrap();

        let (conn, _) = connection();
        let mut order = DocumentModel::with_connection(
            ModelSchema::lookup("HkQuietOrder").unwrap(),
            Scenario::Insert,
            conn,
        );
        order.set("lines", json!([{"sku": "a"}])).unwrap();

        // No handler on the owner, so the whole sweep is skipped and the
        // line hooks never run.
        assert!(order.before_save().unwrap());
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_find_events_observe_lookups() {
        let probes = Arc::new(AtomicUsize::new(0));
        let probes_in_hook = probes.clone();
        ModelSchema::builder("FindUser")
            .fields(["name"])
            .hook(FnHook::on(LifecycleEvent::BeforeFind, move |_, _| {
                probes_in_hook.fetch_add(1, Ordering::SeqCst);
                HookOutcome::Proceed
            }))
            .hook(FnHook::on(LifecycleEvent::AfterFind, |model, _| {
                model.set("seen", json!(true)).ok();
                HookOutcome::Proceed
            }))
            .register()
            .unwrap();

        let (conn, backend) = connection();
        backend.seed("find_users", [json!({"_id": "u1", "name": "lea"})]);
        let finder = Finder::new(ModelSchema::lookup("FindUser").unwrap(), conn);

        let mut found = finder
            .find_one(&doc(json!({"_id": "u1"})))
            .unwrap()
            .unwrap();
        assert_eq!(probes.load(Ordering::SeqCst), 1);
        assert_eq!(found.get("seen").unwrap().as_value(), Some(&json!(true)));
    }

    #[test]
    fn test_instance_hooks_attach_on_top_of_schema_hooks() {
        register_fixtures();
        let (conn, _) = connection();
        let mut model = customer(&conn);

        assert!(!model.handles_event(LifecycleEvent::BeforeDelete));
        model.attach_hook(FnHook::on(LifecycleEvent::BeforeDelete, |_, _| {
            HookOutcome::Cancel
        }));
        assert!(model.handles_event(LifecycleEvent::BeforeDelete));
        model.set("_id", json!("c1")).unwrap();
        assert!(!model.delete().unwrap());
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    #[test]
    fn test_save_inserts_then_updates() {
        register_fixtures();
        let (conn, backend) = connection();
        let mut model = customer(&conn);
        model.set("name", json!("Ana")).unwrap();

        assert!(model.save().unwrap());
        assert!(model.attributes().is_set("_id"));
        assert_eq!(backend.documents("customers").len(), 1);

        model.set("name", json!("Anna")).unwrap();
        assert!(model.save().unwrap());
        let stored = backend.documents("customers");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["name"], json!("Anna"));
    }

    #[test]
    fn test_delete_requires_primary_key() {
        register_fixtures();
        let (conn, backend) = connection();
        let mut model = customer(&conn);

        assert!(matches!(
            model.delete().unwrap_err(),
            ModelError::MissingPrimaryKey { .. }
        ));

        model.set("name", json!("Ana")).unwrap();
        model.save().unwrap();
        assert!(model.delete().unwrap());
        assert!(backend.documents("customers").is_empty());
    }

    #[test]
    fn test_finder_find_by_pk_and_find_all() {
        register_fixtures();
        let (conn, backend) = connection();
        backend.seed(
            "posts",
            [
                json!({"_id": "p1", "title": "one", "author_id": "a"}),
                json!({"_id": "p2", "title": "two", "author_id": "a"}),
            ],
        );
        let finder = Finder::new(ModelSchema::lookup("Post").unwrap(), conn);

        let one = finder.find_by_pk(json!("p2")).unwrap().unwrap();
        assert_eq!(one.attributes().get("title"), Some(&json!("two")));
        assert!(finder.find_by_pk(json!("p9")).unwrap().is_none());

        let all = finder.find_all(&doc(json!({"author_id": "a"}))).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].scenario(), &Scenario::Update);
    }
}
