//! Denormalization of content rows into search documents.
//!
//! Relation rows are first grouped by their parent id, then one document is
//! built per info row. Nested lists keep the order in which the rows were
//! read, and output documents keep the order of the info rows.

use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};
use uuid::Uuid;

use movies_etl_shared::{
    FilmDocument, FilmPersonRef, FilmWorkGenreRecord, FilmWorkInfo, FilmWorkPersonRecord,
    GenreDocument, GenreInfo, GenreRef, PersonDocument, PersonFilmRef, PersonFilmWorkRecord,
    PersonInfo, Role,
};

/// Group `records` by the key returned from `parent`, preserving row order
/// within each group.
fn group_by<'a, T>(records: &'a [T], parent: impl Fn(&T) -> Uuid) -> HashMap<Uuid, Vec<&'a T>> {
    let mut groups: HashMap<Uuid, Vec<&'a T>> = HashMap::new();
    for record in records {
        groups.entry(parent(record)).or_default().push(record);
    }
    groups
}

/// Build one `genres` document per genre.
pub fn build_genre_documents(genres: &[GenreInfo]) -> Vec<GenreDocument> {
    genres
        .iter()
        .map(|genre| GenreDocument {
            id: genre.id,
            name: genre.name.clone(),
            description: genre.description.clone(),
        })
        .collect()
}

/// Build one `persons` document per person.
///
/// Each person gets one film entry per film; several rows for the same film
/// are merged and their roles unioned in first-seen order.
#[instrument(skip_all, fields(persons = persons.len(), films = films.len()))]
pub fn build_person_documents(
    persons: &[PersonInfo],
    films: &[PersonFilmWorkRecord],
) -> Vec<PersonDocument> {
    let films_by_person = group_by(films, |record| record.person_id);

    let documents: Vec<PersonDocument> = persons
        .iter()
        .map(|person| {
            let mut entries: Vec<PersonFilmRef> = Vec::new();
            let mut positions: HashMap<Uuid, usize> = HashMap::new();

            for record in films_by_person.get(&person.id).into_iter().flatten() {
                match positions.get(&record.film_work_id) {
                    Some(&position) => {
                        let roles = &mut entries[position].roles;
                        for role in &record.roles {
                            if !roles.contains(role) {
                                roles.push(*role);
                            }
                        }
                    }
                    None => {
                        let mut roles: Vec<Role> = Vec::with_capacity(record.roles.len());
                        for role in &record.roles {
                            if !roles.contains(role) {
                                roles.push(*role);
                            }
                        }
                        positions.insert(record.film_work_id, entries.len());
                        entries.push(PersonFilmRef {
                            id: record.film_work_id,
                            title: record.title.clone(),
                            imdb_rating: record.rating,
                            roles,
                        });
                    }
                }
            }

            PersonDocument {
                id: person.id,
                full_name: person.full_name.clone(),
                films: entries,
            }
        })
        .collect();

    debug!(count = documents.len(), "Built person documents");
    documents
}

/// Build one `movies` document per film work.
///
/// Persons are split by role. Within one role a person appears once, even
/// if the rows repeat; the same person may still appear under several roles.
/// Genres are deduplicated by id. A film without relations gets empty lists.
#[instrument(skip_all, fields(films = films.len()))]
pub fn build_film_documents(
    films: &[FilmWorkInfo],
    genres: &[FilmWorkGenreRecord],
    persons: &[FilmWorkPersonRecord],
) -> Vec<FilmDocument> {
    let genres_by_film = group_by(genres, |record| record.film_work_id);
    let persons_by_film = group_by(persons, |record| record.film_work_id);

    let documents: Vec<FilmDocument> = films
        .iter()
        .map(|film| {
            let mut document = FilmDocument::new(
                film.id,
                film.title.clone(),
                film.description.clone(),
                film.rating,
            );

            let mut seen_genres = HashSet::new();
            for record in genres_by_film.get(&film.id).into_iter().flatten() {
                if seen_genres.insert(record.genre_id) {
                    document.genres.push(GenreRef {
                        id: record.genre_id,
                        name: record.genre_name.clone(),
                    });
                }
            }

            let mut seen_persons: HashSet<(Role, Uuid)> = HashSet::new();
            for record in persons_by_film.get(&film.id).into_iter().flatten() {
                if !seen_persons.insert((record.role, record.person_id)) {
                    continue;
                }

                let person = FilmPersonRef {
                    id: record.person_id,
                    name: record.person_full_name.clone(),
                };
                let (refs, names) = match record.role {
                    Role::Director => (&mut document.directors, &mut document.directors_names),
                    Role::Actor => (&mut document.actors, &mut document.actors_names),
                    Role::Writer => (&mut document.writers, &mut document.writers_names),
                };
                names.push(person.name.clone());
                refs.push(person);
            }

            document
        })
        .collect();

    debug!(count = documents.len(), "Built film documents");
    documents
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn film(id: Uuid, title: &str) -> FilmWorkInfo {
        FilmWorkInfo {
            id,
            title: title.to_string(),
            description: None,
            rating: Some(8.6),
            modified_at: Utc::now(),
        }
    }

    fn credit(film_work_id: Uuid, person_id: Uuid, name: &str, role: Role) -> FilmWorkPersonRecord {
        FilmWorkPersonRecord {
            film_work_id,
            person_id,
            person_full_name: name.to_string(),
            role,
        }
    }

    #[test]
    fn test_genre_documents_map_fields() {
        let id = Uuid::new_v4();
        let documents = build_genre_documents(&[GenreInfo {
            id,
            name: "Sci-Fi".to_string(),
            description: Some("Science fiction".to_string()),
        }]);

        assert_eq!(
            documents,
            vec![GenreDocument {
                id,
                name: "Sci-Fi".to_string(),
                description: Some("Science fiction".to_string()),
            }]
        );
    }

    #[test]
    fn test_film_without_relations_has_empty_lists() {
        let id = Uuid::new_v4();
        let documents = build_film_documents(&[film(id, "Untitled")], &[], &[]);

        assert_eq!(documents.len(), 1);
        let document = &documents[0];
        assert_eq!(document.imdb_rating, Some(8.6));
        assert!(document.genres.is_empty());
        assert!(document.actors.is_empty());
        assert!(document.directors_names.is_empty());
    }

    #[test]
    fn test_person_with_several_roles_appears_in_each_role_list() {
        let film_id = Uuid::new_v4();
        let lucas = Uuid::new_v4();
        let hamill = Uuid::new_v4();
        let persons = vec![
            credit(film_id, lucas, "George Lucas", Role::Director),
            credit(film_id, lucas, "George Lucas", Role::Writer),
            credit(film_id, hamill, "Mark Hamill", Role::Actor),
            credit(film_id, hamill, "Mark Hamill", Role::Actor),
        ];

        let documents = build_film_documents(&[film(film_id, "Star Wars")], &[], &persons);
        let document = &documents[0];

        assert_eq!(document.directors_names, vec!["George Lucas"]);
        assert_eq!(document.writers_names, vec!["George Lucas"]);
        assert_eq!(document.actors_names, vec!["Mark Hamill"]);
        assert_eq!(document.actors.len(), 1);
        assert_eq!(document.persons_with_role(Role::Director)[0].id, lucas);
    }

    #[test]
    fn test_film_relations_are_grouped_by_film_in_row_order() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let action = Uuid::new_v4();
        let drama = Uuid::new_v4();
        let genres = vec![
            FilmWorkGenreRecord {
                film_work_id: second,
                genre_id: drama,
                genre_name: "Drama".to_string(),
            },
            FilmWorkGenreRecord {
                film_work_id: first,
                genre_id: action,
                genre_name: "Action".to_string(),
            },
            FilmWorkGenreRecord {
                film_work_id: first,
                genre_id: drama,
                genre_name: "Drama".to_string(),
            },
            FilmWorkGenreRecord {
                film_work_id: first,
                genre_id: action,
                genre_name: "Action".to_string(),
            },
        ];

        let documents = build_film_documents(
            &[film(first, "First"), film(second, "Second")],
            &genres,
            &[],
        );

        assert_eq!(documents[0].id, first);
        let names: Vec<&str> = documents[0].genres.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Action", "Drama"]);

        assert_eq!(documents[1].id, second);
        assert_eq!(documents[1].genres.len(), 1);
    }

    #[test]
    fn test_person_films_are_merged_per_film() {
        let lucas = Uuid::new_v4();
        let star_wars = Uuid::new_v4();
        let thx = Uuid::new_v4();
        let films = vec![
            PersonFilmWorkRecord {
                person_id: lucas,
                film_work_id: star_wars,
                title: "Star Wars".to_string(),
                rating: Some(8.6),
                roles: vec![Role::Director],
            },
            PersonFilmWorkRecord {
                person_id: lucas,
                film_work_id: thx,
                title: "THX 1138".to_string(),
                rating: None,
                roles: vec![Role::Director, Role::Writer],
            },
            PersonFilmWorkRecord {
                person_id: lucas,
                film_work_id: star_wars,
                title: "Star Wars".to_string(),
                rating: Some(8.6),
                roles: vec![Role::Writer, Role::Director],
            },
        ];

        let documents = build_person_documents(
            &[PersonInfo {
                id: lucas,
                full_name: "George Lucas".to_string(),
            }],
            &films,
        );

        let document = &documents[0];
        assert_eq!(document.full_name, "George Lucas");
        assert_eq!(document.films.len(), 2);
        assert_eq!(document.films[0].id, star_wars);
        assert_eq!(document.films[0].roles, vec![Role::Director, Role::Writer]);
        assert_eq!(document.films[1].id, thx);
        assert_eq!(document.films[1].imdb_rating, None);
    }

    #[test]
    fn test_person_without_films() {
        let id = Uuid::new_v4();
        let documents = build_person_documents(
            &[PersonInfo {
                id,
                full_name: "Gary Kurtz".to_string(),
            }],
            &[],
        );

        assert_eq!(documents.len(), 1);
        assert!(documents[0].films.is_empty());
    }

    #[test]
    fn test_documents_are_deterministic() {
        let film_id = Uuid::new_v4();
        let persons = vec![
            credit(film_id, Uuid::new_v4(), "Carrie Fisher", Role::Actor),
            credit(film_id, Uuid::new_v4(), "Harrison Ford", Role::Actor),
        ];
        let films = [film(film_id, "Star Wars")];

        assert_eq!(
            build_film_documents(&films, &[], &persons),
            build_film_documents(&films, &[], &persons)
        );
    }
}
