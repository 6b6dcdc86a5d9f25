//! XML codec.
//!
//! ## Resources
//!
//! | Graph | XML |
//! |-------|-----|
//! | primitive | `<active value="true"/>` |
//! | primitive with id and extensions | `<birthDate id="bd1" value="1974-12-25"><extension url="...">...</extension></birthDate>` |
//! | repeating field | one element per value: `<given value="Peter"/><given value="James"/>` |
//! | complex element | `<identifier id="i1"><system value="..."/></identifier>` |
//! | contained resource | `<contained><Organization id="org1">...</Organization></contained>` |
//! | narrative | the `<div xmlns="http://www.w3.org/1999/xhtml">` element, verbatim |
//!
//! The FHIR namespace is declared on the outermost resource element. `id` and
//! `url` of complex elements are attributes; everything else is a child
//! element.
//!
//! XML cannot tell a repeating element with one occurrence from a single one,
//! nor a string from a number. Declared [`TypeShape`](helios_client_model::TypeShape)s
//! settle both; without a shape, repeated siblings make a repeating field and
//! every `value` is a string.
//!
//! ## Feeds and tag lists
//!
//! Feeds are Atom documents:
//!
//! ```xml
//! <feed xmlns="http://www.w3.org/2005/Atom">
//!   <title>Search results</title>
//!   <link rel="next" href="http://example.org/fhir/Patient?_count=10&amp;page=2"/>
//!   <os:totalResults xmlns:os="http://a9.com/-/spec/opensearch/1.1/">12</os:totalResults>
//!   <entry>
//!     <id>http://example.org/fhir/Patient/1</id>
//!     <link rel="self" href="http://example.org/fhir/Patient/1/_history/1"/>
//!     <content type="text/xml"><Patient xmlns="http://hl7.org/fhir">...</Patient></content>
//!   </entry>
//!   <at:deleted-entry xmlns:at="http://purl.org/atompub/tombstones/1.0"
//!       ref="http://example.org/fhir/Patient/2" when="2014-01-01T00:00:00Z"/>
//! </feed>
//! ```
//!
//! Tag lists are `<taglist xmlns="http://hl7.org/fhir">` with one
//! `<category term=".." scheme=".." label=".."/>` per tag.

pub(crate) mod de;
pub(crate) mod dom;
pub(crate) mod ser;
