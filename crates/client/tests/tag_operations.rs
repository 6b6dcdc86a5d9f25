//! Tag tests: affixing, reading at every scope and removing.

mod common;

use common::{organization, patient, review_tag, setup, vip_tag};
use helios_client::{ErrorKind, TagScope};
use helios_client_model::{FHIR_TAG_SCHEME_SECURITY, Tag};
use helios_client_serde::ResourceFormat;
use http::Method;
use http::header::CONTENT_TYPE;

#[test]
fn test_tags_are_visible_at_every_scope() {
    let (server, mut client) = setup();
    let created = client.create(&patient("Everywoman", "Eve"), &[vip_tag()]).unwrap();
    client.create(&organization("Untagged"), &[]).unwrap();

    client.affix_tags(&created.id, &[review_tag()]).unwrap();
    let request = server.last_request();
    assert_eq!(request.method, Method::POST);
    assert!(request.url.path().ends_with("/_tags"));
    assert_eq!(request.headers[CONTENT_TYPE], "application/xml+fhir; charset=UTF-8");

    let all = client.get_all_tags().unwrap();
    assert!(all.contains(&vip_tag()));
    assert!(all.contains(&review_tag()));

    let patients = client.get_type_tags("Patient").unwrap();
    assert!(patients.contains(&vip_tag()));
    assert!(patients.contains(&review_tag()));
    assert!(client.get_type_tags("Organization").unwrap().is_empty());

    let resource = client.get_resource_tags(&created.id).unwrap();
    assert_eq!(resource, vec![vip_tag(), review_tag()]);
    assert_eq!(resource[0].label.as_deref(), Some("VIP"));

    let version = client
        .get_resource_tags(created.self_link.as_ref().unwrap())
        .unwrap();
    assert_eq!(version, vec![vip_tag(), review_tag()]);
    assert!(
        server
            .last_request()
            .url
            .path()
            .ends_with("/_history/1/_tags")
    );
}

#[test]
fn test_delete_tags() {
    let (server, mut client) = setup();
    let created = client
        .create(&organization("Tagged"), &[vip_tag(), review_tag()])
        .unwrap();

    client.delete_tags(&created.id, &[review_tag()]).unwrap();
    assert_eq!(server.last_request().method, Method::DELETE);
    assert_eq!(client.get_resource_tags(&created.id).unwrap(), vec![vip_tag()]);

    // Removing a tag that is not there leaves the rest alone.
    client.delete_tags(&created.id, &[review_tag()]).unwrap();
    assert_eq!(client.get_resource_tags(&created.id).unwrap(), vec![vip_tag()]);
}

#[test]
fn test_tags_survive_update() {
    let (_server, mut client) = setup();
    let created = client.create(&organization("Kept"), &[vip_tag()]).unwrap();

    let updated = client.update(&created).unwrap();
    assert_eq!(updated.tags, vec![vip_tag()]);

    let read = client.read(&created.id).unwrap();
    assert_eq!(read.tags, vec![vip_tag()]);
}

#[test]
fn test_security_tags_in_json() {
    let (_server, mut client) = setup();
    client.set_preferred_format(ResourceFormat::Json);
    let restricted = Tag::new(
        "http://hl7.org/fhir/v3/Confidentiality#R",
        FHIR_TAG_SCHEME_SECURITY,
        "restricted",
    );

    let created = client.create(&patient("Everywoman", "Eve"), &[]).unwrap();
    client.affix_tags(&created.id, &[restricted.clone()]).unwrap();

    let tags = client.get_tags(&TagScope::Resource(created.id.clone())).unwrap();
    assert_eq!(tags, vec![restricted]);
    assert_eq!(tags[0].scheme, FHIR_TAG_SCHEME_SECURITY);
    assert_eq!(
        client.last_response().unwrap().format(),
        Some(ResourceFormat::Json)
    );
}

#[test]
fn test_tags_of_deleted_resource() {
    let (_server, mut client) = setup();
    let created = client.create(&organization("Short lived"), &[vip_tag()]).unwrap();
    client.delete(&created).unwrap();

    let err = client.get_resource_tags(&created.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceGone);

    let err = client.affix_tags(&created.id, &[review_tag()]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceGone);

    // The tags of the stored version remain readable.
    let version = client
        .get_resource_tags(created.self_link.as_ref().unwrap())
        .unwrap();
    assert_eq!(version, vec![vip_tag()]);
}
